//! Postgres-backed persistence
//!
//! One pool serves the cache, conversation context and leaderboard tables.
//! The schema is created lazily on first use.

use crate::cache::{CacheEntry, KvBackend};
use crate::conversation::ContextBackend;
use crate::error::TipsterError;
use crate::leaderboard::ScoreBackend;
use crate::models::{LeaderboardEntry, Sentiment, Topic, UserContext, MAX_RECENT_MESSAGES};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::warn;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cache_entries (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL,
      expires_at TIMESTAMPTZ NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_context (
      user_id TEXT PRIMARY KEY,
      last_sentiment TEXT NOT NULL DEFAULT 'neutral',
      last_topic TEXT NOT NULL DEFAULT 'none',
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_messages (
      message_id BIGSERIAL PRIMARY KEY,
      user_id TEXT NOT NULL,
      content TEXT NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_user_messages_user
    ON user_messages (user_id, message_id);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS leaderboard (
      user_id TEXT PRIMARY KEY,
      score BIGINT NOT NULL DEFAULT 0,
      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_leaderboard_rank
    ON leaderboard (score DESC, updated_at DESC);
    "#,
];

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Build a lazily-connecting pool; no connection is opened here.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| store_error("Failed to configure postgres pool", e))?;

        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(*statement).execute(&self.pool).await?;
                }
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| store_error("Failed to initialize schema", e))?;

        Ok(())
    }

    async fn load_context(&self, user_id: &str) -> Result<Option<UserContext>> {
        let state = sqlx::query(
            "SELECT last_sentiment, last_topic FROM user_context WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("Failed to load user context", e))?;

        let Some(state) = state else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT content FROM user_messages
            WHERE user_id = $1
            ORDER BY message_id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(MAX_RECENT_MESSAGES as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to load recent messages", e))?;

        let messages: Vec<String> = rows
            .iter()
            .rev()
            .map(|row| row.try_get("content").unwrap_or_default())
            .collect();

        let sentiment: String = state.try_get("last_sentiment").unwrap_or_default();
        let topic: String = state.try_get("last_topic").unwrap_or_default();

        Ok(Some(UserContext::from_parts(
            messages,
            sentiment.parse().unwrap_or_default(),
            topic.parse().unwrap_or_default(),
        )))
    }
}

fn store_error(context: &str, error: sqlx::Error) -> TipsterError {
    TipsterError::StoreUnavailable(format!("{}: {}", context, error))
}

#[async_trait::async_trait]
impl KvBackend for PostgresStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT key, value, expires_at FROM cache_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to read cache entry", e))?;

        Ok(row.map(|row| CacheEntry {
            key: row.try_get("key").unwrap_or_else(|_| key.to_string()),
            value: row.try_get("value").unwrap_or_default(),
            expires_at: row
                .try_get::<DateTime<Utc>, _>("expires_at")
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
              SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to write cache entry", e))?;

        Ok(())
    }

    async fn remove_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM cache_entries WHERE key = $1 AND expires_at <= $2")
            .bind(key)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to evict cache entry", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        self.ensure_schema().await?;

        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to purge cache entries", e))?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl ContextBackend for PostgresStore {
    async fn get(&self, user_id: &str) -> Result<UserContext> {
        self.ensure_schema().await?;

        if let Some(context) = self.load_context(user_id).await? {
            return Ok(context);
        }

        sqlx::query("INSERT INTO user_context (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to create user context", e))?;

        Ok(UserContext::new())
    }

    async fn append(&self, user_id: &str, message: &str, sentiment: Sentiment) -> Result<UserContext> {
        self.ensure_schema().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to begin context transaction", e))?;

        // The upsert holds the row lock until commit, serializing appends per user.
        sqlx::query(
            r#"
            INSERT INTO user_context (user_id, last_sentiment, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
              SET last_sentiment = EXCLUDED.last_sentiment, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(sentiment.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("Failed to update user context", e))?;

        sqlx::query("INSERT INTO user_messages (user_id, content) VALUES ($1, $2)")
            .bind(user_id)
            .bind(message)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to insert message", e))?;

        sqlx::query(
            r#"
            DELETE FROM user_messages
            WHERE user_id = $1 AND message_id NOT IN (
              SELECT message_id FROM user_messages
              WHERE user_id = $1
              ORDER BY message_id DESC
              LIMIT $2
            )
            "#,
        )
        .bind(user_id)
        .bind(MAX_RECENT_MESSAGES as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("Failed to trim message history", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit context transaction", e))?;

        match self.load_context(user_id).await {
            Ok(Some(context)) => Ok(context),
            Ok(None) => Ok(UserContext::new()),
            Err(error) => {
                warn!(user_id, error = %error, "Context reload after append failed");
                Err(error)
            }
        }
    }

    async fn set_topic(&self, user_id: &str, topic: Topic) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO user_context (user_id, last_topic, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
              SET last_topic = EXCLUDED.last_topic, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(topic.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to update topic", e))?;

        Ok(())
    }

    async fn reset(&self, user_id: &str, sentiment: Sentiment) -> Result<()> {
        self.ensure_schema().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to begin reset transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO user_context (user_id, last_sentiment, last_topic, updated_at)
            VALUES ($1, $2, 'none', NOW())
            ON CONFLICT (user_id) DO UPDATE
              SET last_sentiment = EXCLUDED.last_sentiment, last_topic = 'none', updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(sentiment.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("Failed to reset user context", e))?;

        sqlx::query("DELETE FROM user_messages WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("Failed to clear message history", e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit reset transaction", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl ScoreBackend for PostgresStore {
    async fn increment(&self, user_id: &str) -> Result<u64> {
        self.ensure_schema().await?;

        let score: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO leaderboard (user_id, score, updated_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (user_id) DO UPDATE
              SET score = leaderboard.score + 1, updated_at = NOW()
            RETURNING score
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to increment score", e))?;

        Ok(score.max(0) as u64)
    }

    async fn top_k(&self, k: usize) -> Result<Vec<LeaderboardEntry>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT user_id, score FROM leaderboard
            ORDER BY score DESC, updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| store_error("Failed to read leaderboard", e))?;

        Ok(rows
            .into_iter()
            .map(|row| LeaderboardEntry {
                user_id: row.try_get("user_id").unwrap_or_default(),
                score: row.try_get::<i64, _>("score").unwrap_or(0).max(0) as u64,
            })
            .collect())
    }
}

//! Activity leaderboard
//!
//! Monotonic per-user counters with a ranked top-K read. Backed by a
//! sorted-score capability; in-memory for development, Postgres in production.

use crate::models::LeaderboardEntry;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Sorted-score increment and range-query capability.
#[async_trait::async_trait]
pub trait ScoreBackend: Send + Sync {
    /// Atomic +1, returning the updated score. Unknown users start at 0.
    async fn increment(&self, user_id: &str) -> Result<u64>;
    /// Highest scores first. Ties go to the most recently updated user.
    async fn top_k(&self, k: usize) -> Result<Vec<LeaderboardEntry>>;
}

#[derive(Debug, Clone, Copy)]
struct ScoreRecord {
    score: u64,
    /// Monotonic update counter, used for tie-breaks.
    touched: u64,
}

#[derive(Default)]
struct ScoreBoard {
    records: HashMap<String, ScoreRecord>,
    clock: u64,
}

/// In-memory score backend
pub struct InMemoryScoreBackend {
    board: Arc<RwLock<ScoreBoard>>,
}

impl InMemoryScoreBackend {
    pub fn new() -> Self {
        Self {
            board: Arc::new(RwLock::new(ScoreBoard::default())),
        }
    }
}

impl Default for InMemoryScoreBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ScoreBackend for InMemoryScoreBackend {
    async fn increment(&self, user_id: &str) -> Result<u64> {
        let mut board = self.board.write().await;
        board.clock += 1;
        let touched = board.clock;

        let record = board
            .records
            .entry(user_id.to_string())
            .or_insert(ScoreRecord { score: 0, touched });
        record.score += 1;
        record.touched = touched;

        Ok(record.score)
    }

    async fn top_k(&self, k: usize) -> Result<Vec<LeaderboardEntry>> {
        let board = self.board.read().await;

        let mut ranked: Vec<_> = board.records.iter().collect();
        ranked.sort_by(|(_, a), (_, b)| {
            b.score.cmp(&a.score).then_with(|| b.touched.cmp(&a.touched))
        });

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(user_id, record)| LeaderboardEntry {
                user_id: user_id.clone(),
                score: record.score,
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct LeaderboardStore {
    backend: Arc<dyn ScoreBackend>,
}

impl LeaderboardStore {
    pub fn new(backend: Arc<dyn ScoreBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryScoreBackend::new()))
    }

    pub async fn increment(&self, user_id: &str) -> Result<u64> {
        self.backend.increment(user_id).await
    }

    /// Count one qualifying interaction. A store outage drops the point.
    pub async fn record_activity(&self, user_id: &str) -> Option<u64> {
        match self.backend.increment(user_id).await {
            Ok(score) => {
                debug!(user_id, score, "Leaderboard incremented");
                Some(score)
            }
            Err(error) => {
                warn!(user_id, error = %error, "Leaderboard increment dropped");
                None
            }
        }
    }

    /// Never fails; an unreachable store reads as an empty board.
    pub async fn top_k(&self, k: usize) -> Vec<LeaderboardEntry> {
        match self.backend.top_k(k).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(error = %error, "Leaderboard read failed, showing empty board");
                Vec::new()
            }
        }
    }
}

/// `1. alice: 3` lines joined by newlines.
pub fn format_leaderboard(entries: &[LeaderboardEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {}: {}", i + 1, entry.user_id, entry.score))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TipsterError;

    struct DownBackend;

    #[async_trait::async_trait]
    impl ScoreBackend for DownBackend {
        async fn increment(&self, _user_id: &str) -> Result<u64> {
            Err(TipsterError::StoreUnavailable("down".into()))
        }
        async fn top_k(&self, _k: usize) -> Result<Vec<LeaderboardEntry>> {
            Err(TipsterError::StoreUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_sequential_increments() {
        let store = LeaderboardStore::in_memory();
        let mut last = 0;
        for _ in 0..7 {
            last = store.increment("alice").await.unwrap();
        }
        assert_eq!(last, 7);
    }

    #[tokio::test]
    async fn test_top_k_sorted_descending() {
        let store = LeaderboardStore::in_memory();
        for (user, n) in [("alice", 2), ("bob", 5), ("carol", 1), ("dave", 3)] {
            for _ in 0..n {
                store.increment(user).await.unwrap();
            }
        }

        let top = store.top_k(3).await;
        let users: Vec<_> = top.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["bob", "dave", "alice"]);
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_top_k_with_fewer_users() {
        let store = LeaderboardStore::in_memory();
        assert!(store.top_k(3).await.is_empty());

        store.increment("solo").await.unwrap();
        assert_eq!(
            store.top_k(3).await,
            vec![LeaderboardEntry {
                user_id: "solo".into(),
                score: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_atomic() {
        let store = LeaderboardStore::in_memory();
        let mut handles = Vec::new();

        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.increment("busy").await }));
        }
        for handle in handles {
            tokio_test::assert_ok!(handle.await.unwrap());
        }

        assert_eq!(store.increment("busy").await.unwrap(), 51);
    }

    #[tokio::test]
    async fn test_outage_is_non_fatal() {
        let store = LeaderboardStore::new(Arc::new(DownBackend));
        assert_eq!(store.record_activity("x").await, None);
        assert!(store.top_k(3).await.is_empty());
    }

    #[test]
    fn test_format_leaderboard() {
        let entries = vec![
            LeaderboardEntry { user_id: "bob".into(), score: 5 },
            LeaderboardEntry { user_id: "dave".into(), score: 3 },
        ];
        assert_eq!(format_leaderboard(&entries), "1. bob: 5\n2. dave: 3");
        assert_eq!(format_leaderboard(&[]), "");
    }
}

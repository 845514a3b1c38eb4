//! External data cache
//!
//! Get-or-fetch-and-store cache with TTL in front of remote providers.
//! A failed fetch never poisons the cache: the caller's fallback value is
//! returned and nothing is written.

use crate::error::TipsterError;
use crate::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Cached payload with its expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    /// Serialized JSON payload, opaque to the store.
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: String, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at: expiry_after(Utc::now(), ttl),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Key-value get/set-with-expiry capability.
#[async_trait::async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    /// Fully replaces any previous entry under the same key.
    async fn set(&self, entry: CacheEntry) -> Result<()>;
    /// Delete `key` only if its stored entry is expired at `now`, so a fresh
    /// entry written concurrently survives. Returns whether a row went.
    async fn remove_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool>;
    /// Drop every entry expired at `now`, returning how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// In-memory key-value store for development and tests
pub struct InMemoryKvBackend {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryKvBackend {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryKvBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KvBackend for InMemoryKvBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - entries.len()) as u64)
    }
}

/// TTL cache guarding calls to external providers.
#[derive(Clone)]
pub struct ExternalDataCache {
    backend: Arc<dyn KvBackend>,
    fetch_timeout: Duration,
}

impl ExternalDataCache {
    pub fn new(backend: Arc<dyn KvBackend>, fetch_timeout: Duration) -> Self {
        Self {
            backend,
            fetch_timeout,
        }
    }

    /// Return the cached value for `key` if present and unexpired, otherwise
    /// run `fetch`, store the result for `ttl` and return it.
    ///
    /// If `fetch` fails or exceeds the fetch timeout, `fallback` is returned
    /// and the cache is left untouched.
    pub async fn get_or_fetch<T, F, Fut, FB>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
        fallback: FB,
    ) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce() -> T,
    {
        if let Some(value) = self.read_fresh(key).await {
            debug!(key, "Cache hit");
            return value;
        }

        debug!(key, "Cache miss, fetching");
        self.fetch_and_store(key, ttl, fetch, fallback).await
    }

    /// Fetch unconditionally and overwrite the entry on success. On failure
    /// the previous entry, if any, stays in place.
    pub async fn refresh<T, F, Fut, FB>(&self, key: &str, ttl: Duration, fetch: F, fallback: FB) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce() -> T,
    {
        info!(key, "Refreshing cache entry");
        self.fetch_and_store(key, ttl, fetch, fallback).await
    }

    /// Sweep expired entries. Store failures are logged and count as zero.
    pub async fn purge_expired(&self) -> u64 {
        match self.backend.purge_expired(Utc::now()).await {
            Ok(count) => {
                if count > 0 {
                    info!(count, "Purged expired cache entries");
                }
                count
            }
            Err(e) => {
                warn!(error = %e, "Cache purge failed");
                0
            }
        }
    }

    async fn read_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match self.backend.get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let now = Utc::now();
        if entry.is_expired_at(now) {
            debug!(key, "Cache entry expired");
            if let Err(e) = self.backend.remove_expired(key, now).await {
                warn!(key, error = %e, "Cache eviction failed");
            }
            return None;
        }

        match serde_json::from_str(&entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Cached payload unreadable, refetching");
                None
            }
        }
    }

    async fn fetch_and_store<T, F, Fut, FB>(&self, key: &str, ttl: Duration, fetch: F, fallback: FB) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce() -> T,
    {
        let outcome = match tokio::time::timeout(self.fetch_timeout, fetch()).await {
            Ok(result) => result,
            Err(_) => Err(TipsterError::Timeout(format!(
                "{} after {}s",
                key,
                self.fetch_timeout.as_secs_f32()
            ))),
        };

        let value = match outcome {
            Ok(value) => value,
            Err(e) if e.is_external_fetch_failure() => {
                warn!(key, error = %e, "External fetch failed, using fallback");
                return fallback();
            }
            Err(e) => {
                error!(key, error = %e, "Unexpected fetch error, using fallback");
                return fallback();
            }
        };

        match serde_json::to_string(&value) {
            Ok(serialized) => {
                if let Err(e) = self.backend.set(CacheEntry::new(key, serialized, ttl)).await {
                    warn!(key, error = %e, "Cache write failed, value served uncached");
                }
            }
            Err(e) => warn!(key, error = %e, "Value not serializable, served uncached"),
        }

        value
    }
}

/// `now + ttl`, saturating at the latest representable instant.
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    ChronoDuration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(60);

    fn cache() -> (ExternalDataCache, Arc<InMemoryKvBackend>) {
        let backend = Arc::new(InMemoryKvBackend::new());
        (
            ExternalDataCache::new(backend.clone(), Duration::from_secs(5)),
            backend,
        )
    }

    /// Backend whose every call fails.
    struct DownBackend;

    #[async_trait::async_trait]
    impl KvBackend for DownBackend {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
            Err(TipsterError::StoreUnavailable("down".into()))
        }
        async fn set(&self, _entry: CacheEntry) -> Result<()> {
            Err(TipsterError::StoreUnavailable("down".into()))
        }
        async fn remove_expired(&self, _key: &str, _now: DateTime<Utc>) -> Result<bool> {
            Err(TipsterError::StoreUnavailable("down".into()))
        }
        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64> {
            Err(TipsterError::StoreUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_fetch_once_within_ttl() {
        let (cache, _) = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: String = cache
                .get_or_fetch(
                    "sports_data",
                    TTL,
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("fixtures".to_string())
                    },
                    || "unavailable".to_string(),
                )
                .await;
            assert_eq!(value, "fixtures");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_returns_fallback_without_poisoning() {
        let (cache, backend) = cache();

        let value: String = cache
            .get_or_fetch(
                "sports_data",
                TTL,
                || async { Err(TipsterError::Transport("connection refused".into())) },
                || "unavailable".to_string(),
            )
            .await;
        assert_eq!(value, "unavailable");
        assert!(backend.get("sports_data").await.unwrap().is_none());

        let value: String = cache
            .get_or_fetch(
                "sports_data",
                TTL,
                || async { Ok("fixtures".to_string()) },
                || "unavailable".to_string(),
            )
            .await;
        assert_eq!(value, "fixtures");
    }

    #[tokio::test]
    async fn test_expired_entry_is_never_returned() {
        let (cache, backend) = cache();
        backend
            .set(CacheEntry {
                key: "sports_data".into(),
                value: "\"stale\"".into(),
                expires_at: Utc::now() - ChronoDuration::seconds(1),
            })
            .await
            .unwrap();

        let value: String = cache
            .get_or_fetch(
                "sports_data",
                TTL,
                || async { Ok("fresh".to_string()) },
                || "unavailable".to_string(),
            )
            .await;
        assert_eq!(value, "fresh");

        let stored = backend.get("sports_data").await.unwrap().unwrap();
        assert_eq!(stored.value, "\"fresh\"");
        assert!(!stored.is_expired_at(Utc::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let backend = Arc::new(InMemoryKvBackend::new());
        let cache = ExternalDataCache::new(backend.clone(), Duration::from_millis(50));

        let value: String = cache
            .get_or_fetch(
                "generation:slow",
                TTL,
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok("too late".to_string())
                },
                || "placeholder".to_string(),
            )
            .await;

        assert_eq!(value, "placeholder");
        assert!(backend.get("generation:slow").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_entry_on_failure() {
        let (cache, backend) = cache();
        let _: String = cache
            .get_or_fetch("k", TTL, || async { Ok("v1".to_string()) }, String::new)
            .await;

        let value: String = cache
            .refresh(
                "k",
                TTL,
                || async { Err(TipsterError::Transport("503".into())) },
                || "fallback".to_string(),
            )
            .await;
        assert_eq!(value, "fallback");
        assert_eq!(backend.get("k").await.unwrap().unwrap().value, "\"v1\"");

        let value: String = cache
            .refresh("k", TTL, || async { Ok("v2".to_string()) }, String::new)
            .await;
        assert_eq!(value, "v2");
        assert_eq!(backend.get("k").await.unwrap().unwrap().value, "\"v2\"");
    }

    #[tokio::test]
    async fn test_store_outage_still_serves_fetched_value() {
        let cache = ExternalDataCache::new(Arc::new(DownBackend), Duration::from_secs(5));
        let value: String = cache
            .get_or_fetch("k", TTL, || async { Ok("live".to_string()) }, String::new)
            .await;
        assert_eq!(value, "live");
        assert_eq!(cache.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (cache, backend) = cache();
        backend
            .set(CacheEntry {
                key: "old".into(),
                value: "1".into(),
                expires_at: Utc::now() - ChronoDuration::seconds(5),
            })
            .await
            .unwrap();
        backend
            .set(CacheEntry::new("new", "2".into(), TTL))
            .await
            .unwrap();

        assert_eq!(cache.purge_expired().await, 1);
        assert!(backend.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_huge_ttl_saturates_instead_of_overflowing() {
        let entry = CacheEntry::new("k", "1".into(), Duration::from_secs(9_000_000_000_000));
        assert_eq!(entry.expires_at, DateTime::<Utc>::MAX_UTC);

        let entry = CacheEntry::new("k", "1".into(), Duration::MAX);
        assert!(!entry.is_expired_at(Utc::now()));

        let (cache, backend) = cache();
        let value: String = cache
            .get_or_fetch(
                "sports_data:4328",
                Duration::from_secs(9_000_000_000_000),
                || async { Ok("fixtures".to_string()) },
                String::new,
            )
            .await;
        assert_eq!(value, "fixtures");
        assert!(backend.get("sports_data:4328").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_removal_spares_fresh_entry() {
        let (_, backend) = cache();
        let stale_at = Utc::now();

        backend.set(CacheEntry::new("k", "\"fresh\"".into(), TTL)).await.unwrap();
        assert!(!backend.remove_expired("k", stale_at).await.unwrap());
        assert!(backend.get("k").await.unwrap().is_some());

        backend
            .set(CacheEntry {
                key: "k".into(),
                value: "\"stale\"".into(),
                expires_at: stale_at - ChronoDuration::seconds(1),
            })
            .await
            .unwrap();
        assert!(backend.remove_expired("k", stale_at).await.unwrap());
        assert!(backend.get("k").await.unwrap().is_none());
        assert!(!backend.remove_expired("missing", stale_at).await.unwrap());
    }

    #[tokio::test]
    async fn test_unexpected_fetch_error_still_falls_back() {
        let (cache, backend) = cache();
        let err = TipsterError::StoreUnavailable("pool closed".into());
        assert!(!err.is_external_fetch_failure());

        let value: String = cache
            .get_or_fetch("k", TTL, || async move { Err(err) }, || "fallback".to_string())
            .await;
        assert_eq!(value, "fallback");
        assert!(backend.get("k").await.unwrap().is_none());
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::services::cache::client::{CacheClient, CacheResult};

/// Expired entries are swept on insert at most this often.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Process-local grant cache for development and tests.
///
/// Expired entries are dropped when touched, and in bulk by the first insert
/// after each `PURGE_INTERVAL`.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, Entry>,
    last_purge: Instant,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Inner {
    fn purge_if_due(&mut self, now: Instant) {
        if now.duration_since(self.last_purge) < PURGE_INTERVAL {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        self.last_purge = now;

        let purged = before - self.entries.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = self.entries.len(), "memory cache purged");
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_purge: Instant::now(),
            }),
        }
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                inner.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        inner.purge_if_due(now);

        if inner.entries.get(key).is_some_and(|e| e.expires_at > now) {
            return Ok(false);
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                // Same one-second floor as the Valkey backend.
                expires_at: now + ttl.max(Duration::from_secs(1)),
            },
        );
        Ok(true)
    }

    async fn take_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        match inner.entries.remove(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();

        assert!(
            cache
                .set_if_absent_with_ttl("par:abc", "v1", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert_eq!(cache.get_string("par:abc").await.unwrap().as_deref(), Some("v1"));

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.get_string("par:abc").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_refuses_live_keys_but_reuses_expired_ones() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(10);

        assert!(cache.set_if_absent_with_ttl("k", "first", ttl).await.unwrap());
        assert!(!cache.set_if_absent_with_ttl("k", "second", ttl).await.unwrap());
        assert_eq!(cache.get_string("k").await.unwrap().as_deref(), Some("first"));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(cache.set_if_absent_with_ttl("k", "third", ttl).await.unwrap());
        assert_eq!(cache.get_string("k").await.unwrap().as_deref(), Some("third"));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_entries_are_purged_on_a_later_insert() {
        let cache = MemoryCache::new();
        for i in 0..20 {
            cache
                .set_if_absent_with_ttl(&format!("par:{i}"), "v", Duration::from_secs(10))
                .await
                .unwrap();
        }
        assert_eq!(cache.len().await, 20);

        // Expired, but no purge is due yet.
        tokio::time::advance(Duration::from_secs(30)).await;
        cache
            .set_if_absent_with_ttl("code:a", "v", Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(cache.len().await, 21);

        tokio::time::advance(Duration::from_secs(31)).await;
        cache
            .set_if_absent_with_ttl("code:b", "v", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get_string("code:a").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn take_returns_live_values_once() {
        let cache = MemoryCache::new();
        cache
            .set_if_absent_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(cache.take_string("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.take_string("k").await.unwrap(), None);

        cache
            .set_if_absent_with_ttl("old", "v", Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.take_string("old").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_takes_have_a_single_winner() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .set_if_absent_with_ttl("k", "v", Duration::from_secs(30))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.take_string("k").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

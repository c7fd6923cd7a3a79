//! Rendered-page cache for the "all posts" feed.
//!
//! Entries expire after their TTL or when `clear` is called. Nothing else
//! invalidates them: creating or deleting a post leaves cached pages stale
//! until one of those two things happens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::RwLock;

pub const DEFAULT_TTL: Duration = Duration::from_secs(900);

#[derive(Clone)]
struct CacheEntry {
    body: Bytes,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Shared handle; clones see the same entries.
#[derive(Clone)]
pub struct PageCache {
    default_ttl: Option<Duration>,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl PageCache {
    /// `None` or a zero TTL disables the cache.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            default_ttl: default_ttl.filter(|ttl| !ttl.is_zero()),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.default_ttl.is_some()
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if !self.is_enabled() {
            return None;
        }

        let now = Instant::now();
        {
            let guard = self.entries.read().await;
            match guard.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.body.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it so the slot reads as empty from now on.
        let mut guard = self.entries.write().await;
        if guard.get(key).is_some_and(|entry| entry.is_expired(now)) {
            guard.remove(key);
            tracing::debug!(key, "Page cache entry expired");
        }
        None
    }

    pub async fn put(&self, key: impl Into<String>, body: Bytes, ttl: Duration) {
        if !self.is_enabled() {
            return;
        }

        let now = Instant::now();
        let entry = CacheEntry {
            body,
            expires_at: now.checked_add(ttl),
        };

        let mut guard = self.entries.write().await;
        // Expired entries whose keys are never read again go here.
        guard.retain(|_, entry| !entry.is_expired(now));
        guard.insert(key.into(), entry);
    }

    /// Store with the configured TTL.
    pub async fn put_default(&self, key: impl Into<String>, body: Bytes) {
        if let Some(ttl) = self.default_ttl {
            self.put(key, body, ttl).await;
        }
    }

    pub async fn clear(&self) {
        let mut guard = self.entries.write().await;
        let dropped = guard.len();
        guard.clear();
        tracing::info!(dropped, "Page cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(Some(DEFAULT_TTL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = PageCache::default();
        assert!(cache.get("index:page=1").await.is_none());

        cache
            .put("index:page=1", Bytes::from_static(b"<p>feed</p>"), DEFAULT_TTL)
            .await;
        assert_eq!(
            cache.get("index:page=1").await,
            Some(Bytes::from_static(b"<p>feed</p>"))
        );
        assert!(cache.get("index:page=2").await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_empty_and_is_dropped() {
        let cache = PageCache::default();
        cache.put("k", Bytes::from_static(b"v"), Duration::ZERO).await;
        assert_eq!(cache.len().await, 1);

        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl_elapses() {
        let cache = PageCache::default();
        cache
            .put("k", Bytes::from_static(b"v"), Duration::from_millis(20))
            .await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn put_sweeps_expired_entries_of_other_keys() {
        let cache = PageCache::default();
        for i in 0..1000 {
            cache
                .put(format!("k{i}"), Bytes::from_static(b"v"), Duration::from_millis(1))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.put_default("fresh", Bytes::from_static(b"v")).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn huge_ttl_never_expires() {
        let cache = PageCache::new(Some(Duration::from_secs(u64::MAX)));
        cache.put_default("k", Bytes::from_static(b"v")).await;
        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"v")));

        cache.put_default("other", Bytes::from_static(b"v")).await;
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn clear_empties_every_key() {
        let cache = PageCache::default();
        cache.put_default("a", Bytes::from_static(b"1")).await;
        cache.put_default("b", Bytes::from_static(b"2")).await;

        cache.clear().await;
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn put_overwrites_existing_value() {
        let cache = PageCache::default();
        cache.put_default("k", Bytes::from_static(b"old")).await;
        cache.put_default("k", Bytes::from_static(b"new")).await;
        assert_eq!(cache.get("k").await, Some(Bytes::from_static(b"new")));
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        for cache in [PageCache::disabled(), PageCache::new(Some(Duration::ZERO))] {
            assert!(!cache.is_enabled());
            cache.put("k", Bytes::from_static(b"v"), DEFAULT_TTL).await;
            cache.put_default("k", Bytes::from_static(b"v")).await;
            assert!(cache.get("k").await.is_none());
            assert!(cache.is_empty().await);
        }
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = PageCache::default();
        let other = cache.clone();
        cache.put_default("k", Bytes::from_static(b"v")).await;
        assert!(other.get("k").await.is_some());

        other.clear().await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_readers_see_whole_values() {
        let cache = PageCache::default();
        let body = Bytes::from(vec![b'x'; 4096]);
        cache.put_default("k", body.clone()).await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            let body = body.clone();
            handles.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    cache.put_default("k", body).await;
                    None
                } else {
                    cache.get("k").await
                }
            }));
        }

        for handle in handles {
            if let Some(read) = handle.await.unwrap() {
                assert_eq!(read.len(), 4096);
            }
        }
    }
}

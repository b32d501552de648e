//! Process-local counter store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::bucket::BucketKey;
use super::store::{CounterStore, StoreError, WindowHit};

/// A single window's counter.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u64,
    expires_at: Instant,
}

impl Bucket {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory [`CounterStore`] backed by a sharded concurrent map.
///
/// Each hit runs under the entry lock of its shard, which serializes all
/// operations on one key while leaving other keys untouched. Suitable for a
/// single instance; use a shared store when several instances must agree.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    buckets: DashMap<BucketKey, Bucket>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for a key, or `None` if there is no live bucket.
    pub fn count(&self, key: &BucketKey) -> Option<u64> {
        let now = Instant::now();
        self.buckets
            .get(key)
            .filter(|b| b.is_live(now))
            .map(|b| b.count)
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.buckets.iter().filter(|b| b.is_live(now)).count()
    }

    /// Whether the store holds no live bucket.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired buckets, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, b| b.is_live(now));
        let removed = before - self.buckets.len();
        if removed > 0 {
            debug!(removed, "Purged expired buckets");
        }
        removed
    }

    /// Purge expired buckets every `every` until the handle is aborted.
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                store.purge_expired();
            }
        })
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn hit(
        &self,
        key: &BucketKey,
        limit: u64,
        window: Duration,
    ) -> Result<WindowHit, StoreError> {
        let now = Instant::now();

        let (allowed, bucket) = match self.buckets.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let bucket = occupied.get_mut();
                if !bucket.is_live(now) {
                    trace!(key = %key, "Window expired, starting a new one");
                    *bucket = Bucket {
                        count: 1,
                        expires_at: now + window,
                    };
                    (true, *bucket)
                } else if bucket.count >= limit {
                    (false, *bucket)
                } else {
                    bucket.count += 1;
                    (true, *bucket)
                }
            }
            Entry::Vacant(vacant) => {
                let bucket = Bucket {
                    count: 1,
                    expires_at: now + window,
                };
                vacant.insert(bucket);
                (true, bucket)
            }
        };

        Ok(WindowHit {
            allowed,
            count: bucket.count,
            reset_after: Some(bucket.expires_at.saturating_duration_since(now)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::IdentityDimension;

    fn key(identity: &str) -> BucketKey {
        BucketKey::new(&IdentityDimension::Ip, identity)
    }

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_first_hit_creates_bucket() {
        let store = InMemoryStore::new();
        let hit = store.hit(&key("a"), 5, WINDOW).await.unwrap();

        assert!(hit.allowed);
        assert_eq!(hit.count, 1);
        assert_eq!(hit.reset_after, Some(WINDOW));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_denied_hit_does_not_increment() {
        let store = InMemoryStore::new();
        for _ in 0..3 {
            assert!(store.hit(&key("a"), 3, WINDOW).await.unwrap().allowed);
        }

        let hit = store.hit(&key("a"), 3, WINDOW).await.unwrap();
        assert!(!hit.allowed);
        assert_eq!(hit.count, 3);
        assert_eq!(store.count(&key("a")), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_not_refreshed_by_later_hits() {
        let store = InMemoryStore::new();
        store.hit(&key("a"), 10, WINDOW).await.unwrap();

        tokio::time::advance(Duration::from_secs(40)).await;
        let hit = store.hit(&key("a"), 10, WINDOW).await.unwrap();
        assert_eq!(hit.reset_after, Some(Duration::from_secs(20)));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(store.count(&key("a")), None);

        let hit = store.hit(&key("a"), 10, WINDOW).await.unwrap();
        assert_eq!(hit.count, 1);
        assert_eq!(hit.reset_after, Some(WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = InMemoryStore::new();
        store.hit(&key("a"), 10, Duration::from_secs(1)).await.unwrap();
        store.hit(&key("b"), 10, WINDOW).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count(&key("b")), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_drops_expired_buckets() {
        let store = Arc::new(InMemoryStore::new());
        store.hit(&key("a"), 10, Duration::from_secs(1)).await.unwrap();

        let handle = store.spawn_purge_task(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(store.buckets.len(), 0);
        handle.abort();
    }
}

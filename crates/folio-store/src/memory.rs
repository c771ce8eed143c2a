//! In-process store backend.
//!
//! Backed by a sharded concurrent map; entry-level locking makes the
//! create-if-absent and increment operations atomic without a global
//! lock. Expiry is evaluated lazily against the injected clock, so tests
//! can drive window transitions deterministically with a
//! [`ManualClock`](folio_core::ManualClock).

use crate::store::{AtomicStore, StoreError, StoreResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use folio_core::{BoxFuture, Clock, SystemClock};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: SystemTime,
}

impl StoredValue {
    fn new(value: &str, now: SystemTime, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: now + ttl,
        }
    }

    fn expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// An in-process [`AtomicStore`] backend.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use folio_store::{AtomicStore, MemoryStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.put("k", "v", Duration::from_secs(60)).await.unwrap();
/// assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
/// # });
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Creates a store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store driven by the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Removes every expired entry and returns how many were purged.
    ///
    /// Expiry is otherwise lazy; long-lived processes can call this
    /// periodically to bound memory.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.expired(now));
        before - self.entries.len()
    }

    /// Returns the number of live (possibly expired, not yet purged)
    /// entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl AtomicStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<Option<String>>> {
        Box::pin(async move {
            let now = self.clock.now();
            Ok(self
                .entries
                .get(key)
                .filter(|stored| !stored.expired(now))
                .map(|stored| stored.value.clone()))
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let now = self.clock.now();
            self.entries
                .insert(key.to_string(), StoredValue::new(value, now, ttl));
            Ok(())
        })
    }

    fn put_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        Box::pin(async move {
            let now = self.clock.now();
            match self.entries.entry(key.to_string()) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().expired(now) {
                        occupied.insert(StoredValue::new(value, now, ttl));
                        Ok(true)
                    } else {
                        Ok(false)
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(StoredValue::new(value, now, ttl));
                    Ok(true)
                }
            }
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.entries.remove(key);
            Ok(())
        })
    }

    fn unlock<'a>(&'a self, key: &'a str, token: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            // The value check happens under the entry's shard lock, so a
            // holder that re-acquired after our TTL keeps its lock.
            self.entries.remove_if(key, |_, stored| stored.value == token);
            Ok(())
        })
    }

    fn increment<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            let now = self.clock.now();
            match self.entries.entry(key.to_string()) {
                Entry::Occupied(mut occupied) => {
                    if occupied.get().expired(now) {
                        occupied.insert(StoredValue::new("1", now, ttl));
                        return Ok(1);
                    }
                    let current: u64 = occupied.get().value.parse().map_err(|_| {
                        StoreError::Corrupt {
                            key: key.to_string(),
                            reason: "counter is not an unsigned integer".to_string(),
                        }
                    })?;
                    let next = current + 1;
                    // Keep the original expiry: the counter lives and dies
                    // with its window.
                    occupied.get_mut().value = next.to_string();
                    Ok(next)
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(StoredValue::new("1", now, ttl));
                    Ok(1)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::ManualClock;

    fn store_at(unix_secs: u64) -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at_unix(unix_secs));
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (store, _clock) = store_at(1_000);
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (store, _clock) = store_at(1_000);
        store.put("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_expired_value_reads_as_absent() {
        let (store, clock) = store_at(1_000);
        store.put("k", "v", Duration::from_secs(10)).await.unwrap();

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_if_absent_first_wins() {
        let (store, _clock) = store_at(1_000);
        assert!(store
            .put_if_absent("k", "first", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .put_if_absent("k", "second", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_put_if_absent_reclaims_expired_entry() {
        let (store, clock) = store_at(1_000);
        assert!(store
            .put_if_absent("k", "first", Duration::from_secs(5))
            .await
            .unwrap());

        clock.advance(Duration::from_secs(6));
        assert!(store
            .put_if_absent("k", "second", Duration::from_secs(5))
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("second".to_string()));
    }

    #[tokio::test]
    async fn test_try_lock_and_unlock() {
        let (store, _clock) = store_at(1_000);
        assert!(store.try_lock("lock", "t1", Duration::from_secs(1)).await.unwrap());
        assert!(!store.try_lock("lock", "t2", Duration::from_secs(1)).await.unwrap());

        store.unlock("lock", "t1").await.unwrap();
        assert!(store.try_lock("lock", "t2", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_expires_on_its_own() {
        let (store, clock) = store_at(1_000);
        assert!(store.try_lock("lock", "t1", Duration::from_secs(1)).await.unwrap());

        clock.advance(Duration::from_secs(2));
        assert!(store.try_lock("lock", "t2", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_with_wrong_token_keeps_the_lock() {
        let (store, _clock) = store_at(1_000);
        assert!(store.try_lock("lock", "owner", Duration::from_secs(1)).await.unwrap());

        store.unlock("lock", "stranger").await.unwrap();
        assert!(
            !store.try_lock("lock", "next", Duration::from_secs(1)).await.unwrap(),
            "a mismatched token must not delete someone else's lock"
        );
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let (store, _clock) = store_at(1_000);
        for expected in 1..=5 {
            let n = store.increment("c", Duration::from_secs(60)).await.unwrap();
            assert_eq!(n, expected);
        }
    }

    #[tokio::test]
    async fn test_increment_resets_after_window() {
        let (store, clock) = store_at(1_000);
        store.increment("c", Duration::from_secs(60)).await.unwrap();
        store.increment("c", Duration::from_secs(60)).await.unwrap();

        clock.advance(Duration::from_secs(61));
        let n = store.increment("c", Duration::from_secs(60)).await.unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_increment_keeps_window_expiry() {
        let (store, clock) = store_at(1_000);
        store.increment("c", Duration::from_secs(10)).await.unwrap();

        // A later increment must not extend the window.
        clock.advance(Duration::from_secs(8));
        store.increment("c", Duration::from_secs(10)).await.unwrap();

        clock.advance(Duration::from_secs(3));
        let n = store.increment("c", Duration::from_secs(10)).await.unwrap();
        assert_eq!(n, 1, "counter should have expired with its window");
    }

    #[tokio::test]
    async fn test_increment_rejects_non_numeric_value() {
        let (store, _clock) = store_at(1_000);
        store.put("c", "not-a-number", Duration::from_secs(60)).await.unwrap();

        let err = store.increment("c", Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_at(1_000);
        store.put("a", "1", Duration::from_secs(5)).await.unwrap();
        store.put("b", "2", Duration::from_secs(500)).await.unwrap();

        clock.advance(Duration::from_secs(10));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("b").await.unwrap(), Some("2".to_string()));
    }
}

//! The store port.

use folio_core::BoxFuture;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the stored value is unusable.
    #[error("corrupt value for key '{key}': {reason}")]
    Corrupt {
        /// The affected key.
        key: String,
        /// Why the value could not be used.
        reason: String,
    },
}

/// The atomic key-value contract the core requires.
///
/// All methods are single round-trips; the only coordination primitives
/// the rest of the system builds on are the atomic `put_if_absent`
/// (create-if-absent totally orders competing executions per key) and the
/// atomic `increment` (windowed counters).
///
/// Values expire at their TTL; expired keys behave exactly like absent
/// keys.
pub trait AtomicStore: Send + Sync + 'static {
    /// Reads the value at `key`, if present and unexpired.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<Option<String>>>;

    /// Writes `value` at `key`, replacing any existing value and
    /// resetting the TTL.
    fn put<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, StoreResult<()>>;

    /// Atomically writes `value` at `key` only if the key is absent.
    ///
    /// Returns `true` if this call created the entry.
    fn put_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, StoreResult<bool>>;

    /// Removes the value at `key`, if any.
    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    /// Atomically increments the counter at `key` and returns the
    /// post-increment value.
    ///
    /// The TTL is applied when the counter is created and left untouched
    /// afterwards, which binds the counter's lifecycle to its window.
    fn increment<'a>(&'a self, key: &'a str, ttl: Duration) -> BoxFuture<'a, StoreResult<u64>>;

    /// Attempts an atomic, TTL-bounded mutual-exclusion acquisition,
    /// writing `token` as the lock value to prove ownership at release.
    ///
    /// Returns `false` if the lock is currently held by someone else.
    fn try_lock<'a>(
        &'a self,
        key: &'a str,
        token: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, StoreResult<bool>> {
        self.put_if_absent(key, token, ttl)
    }

    /// Releases a lock taken with [`try_lock`](Self::try_lock), but only
    /// while it still holds `token`.
    ///
    /// A compare-and-delete: if the lock expired and someone else
    /// re-acquired it, their lock must survive a stale release. Releasing
    /// an expired or re-acquired lock is therefore a silent no-op, not an
    /// error.
    fn unlock<'a>(&'a self, key: &'a str, token: &'a str) -> BoxFuture<'a, StoreResult<()>>;
}

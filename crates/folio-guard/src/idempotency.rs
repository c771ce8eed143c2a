//! The idempotency guard service.
//!
//! Provides the primitive operations the idempotency pipeline stage
//! composes into at-most-once execution: a short-TTL mutual-exclusion
//! lock per key, and a long-TTL record holding the execution status and
//! the stored response.
//!
//! The two TTLs are different lifetimes and must not be confused: the
//! lock only needs to outlive one handler invocation (seconds), while
//! the record must outlive the client's retry horizon (hours).

use crate::record::IdempotencyRecord;
use folio_core::GuardError;
use folio_store::AtomicStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Proof of lock ownership, minted per acquisition.
///
/// Releasing requires the token handed out by the matching
/// [`IdempotencyService::acquire_lock`] call, so a holder whose lock
/// expired cannot free a lock someone else has since taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn mint() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Default lock TTL: short relative to expected handler latency.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(1);

/// Default record TTL: long enough to absorb client retries.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the idempotency guard.
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// TTL of the per-key mutual-exclusion lock.
    pub lock_ttl: Duration,
    /// TTL of the idempotency record (and the stored response).
    pub record_ttl: Duration,
    /// Prefix namespacing the guard's keys in the shared store.
    pub key_prefix: String,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            record_ttl: DEFAULT_RECORD_TTL,
            key_prefix: "folio:idem".to_string(),
        }
    }
}

impl IdempotencyConfig {
    /// Sets the lock TTL.
    #[must_use]
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Sets the record TTL.
    #[must_use]
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.record_ttl = ttl;
        self
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

/// The idempotency guard service.
///
/// One record per distinct key; for a given key at most one execution of
/// the guarded handler is ever in flight, enforced by the store's atomic
/// create-if-absent on the lock key.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use folio_guard::{IdempotencyConfig, IdempotencyService};
/// use folio_store::MemoryStore;
///
/// # tokio_test::block_on(async {
/// let service = IdempotencyService::new(
///     Arc::new(MemoryStore::new()),
///     IdempotencyConfig::default(),
/// );
///
/// let token = service.acquire_lock("order-42").await.unwrap().unwrap();
/// assert!(service.acquire_lock("order-42").await.unwrap().is_none());
/// service.release_lock("order-42", &token).await;
/// # });
/// ```
#[derive(Clone)]
pub struct IdempotencyService {
    store: Arc<dyn AtomicStore>,
    config: IdempotencyConfig,
}

impl IdempotencyService {
    /// Creates a guard service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn AtomicStore>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    fn lock_key(&self, key: &str) -> String {
        format!("{}:lock:{key}", self.config.key_prefix)
    }

    fn record_key(&self, key: &str) -> String {
        format!("{}:record:{key}", self.config.key_prefix)
    }

    /// Attempts the atomic, TTL-bounded lock acquisition for `key`.
    ///
    /// Returns a [`LockToken`] on success, `None` when another execution
    /// currently holds the lock. A single atomic try, no retry or sleep
    /// inside the guard.
    ///
    /// # Errors
    ///
    /// [`GuardError::StorageUnavailable`] when the store round-trip fails;
    /// the lock state for the key is then unknown.
    pub async fn acquire_lock(&self, key: &str) -> Result<Option<LockToken>, GuardError> {
        let token = LockToken::mint();
        let acquired = self
            .store
            .try_lock(&self.lock_key(key), token.as_str(), self.config.lock_ttl)
            .await
            .map_err(|e| GuardError::storage_unavailable(e.to_string()))?;
        Ok(acquired.then_some(token))
    }

    /// Releases the lock for `key` held under `token`.
    ///
    /// Invoked on every exit path. The release only takes effect when the
    /// stored token still matches, so a holder whose lock TTL already
    /// lapsed cannot free a successor's lock. Failures are logged and
    /// swallowed: the lock's TTL bounds the damage of a missed release,
    /// and the caller's outcome must not change because cleanup hiccuped.
    pub async fn release_lock(&self, key: &str, token: &LockToken) {
        if let Err(e) = self.store.unlock(&self.lock_key(key), token.as_str()).await {
            tracing::warn!(idempotency_key = key, error = %e, "failed to release idempotency lock");
        }
    }

    /// Fetches the record for `key`, if one exists.
    ///
    /// # Errors
    ///
    /// [`GuardError::StorageUnavailable`] on store failure or when the
    /// stored record cannot be decoded.
    pub async fn get_record(&self, key: &str) -> Result<Option<IdempotencyRecord>, GuardError> {
        let raw = self
            .store
            .get(&self.record_key(key))
            .await
            .map_err(|e| GuardError::storage_unavailable(e.to_string()))?;

        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                GuardError::storage_unavailable(format!("undecodable record for '{key}': {e}"))
            }),
        }
    }

    /// Writes a `Started` record for `key` with the record TTL.
    ///
    /// Only called while holding the key's lock, which is what keeps a
    /// `Finished` record from ever being overwritten: the stage checks
    /// the record before marking.
    ///
    /// # Errors
    ///
    /// [`GuardError::StorageUnavailable`] when the write fails — a
    /// storage failure, never to be read as "already running".
    pub async fn mark_started(&self, key: &str) -> Result<(), GuardError> {
        self.put_record(key, &IdempotencyRecord::started()).await
    }

    /// Transitions the record to `Finished` with the stored response,
    /// refreshing the record TTL.
    ///
    /// # Errors
    ///
    /// [`GuardError::StorageUnavailable`] when the write fails.
    pub async fn save_response(
        &self,
        key: &str,
        status_code: u16,
        body: impl Into<String>,
    ) -> Result<(), GuardError> {
        self.put_record(key, &IdempotencyRecord::finished(status_code, body))
            .await
    }

    async fn put_record(&self, key: &str, record: &IdempotencyRecord) -> Result<(), GuardError> {
        let json = serde_json::to_string(record)
            .map_err(|e| GuardError::storage_unavailable(format!("record encode failed: {e}")))?;
        self.store
            .put(&self.record_key(key), &json, self.config.record_ttl)
            .await
            .map_err(|e| GuardError::storage_unavailable(e.to_string()))
    }
}

impl std::fmt::Debug for IdempotencyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

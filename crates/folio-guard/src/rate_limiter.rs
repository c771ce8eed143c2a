//! Per-identifier rate limiting over the shared store.
//!
//! Fixed counting windows: each check atomically increments the counter
//! for `(identifier, current window bucket)` and compares the
//! post-increment count against the limit. The counter's TTL is bound to
//! the window, so state resets automatically when the window elapses and
//! distinct identifiers never share a counter.
//!
//! The limiter never fails a request on its own: a store outage is
//! logged, counted, and answered with an allow (fail-open). Rendering a
//! denial — 429, `Retry-After`, the `X-RateLimit-*` headers — is the
//! transport filter's job.

use folio_core::Clock;
use folio_store::AtomicStore;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;

/// The outcome of one rate-limit check, computed fresh per check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is within budget.
    pub allowed: bool,
    /// Post-increment request count in the current window. The attempt
    /// itself counts, including denied ones.
    pub current: u64,
    /// The configured limit the count was compared against.
    pub limit: u64,
    /// Unix timestamp at which the current window ends.
    pub reset_at: u64,
}

impl RateLimitDecision {
    /// Requests left in the current window.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.current)
    }

    /// Seconds until the window resets, measured from `now`; at least 1.
    #[must_use]
    pub const fn retry_after(&self, now: u64) -> u64 {
        let secs = self.reset_at.saturating_sub(now);
        if secs == 0 {
            1
        } else {
            secs
        }
    }
}

/// A store-backed fixed-window rate limiter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use folio_core::SystemClock;
/// use folio_guard::RateLimiter;
/// use folio_store::MemoryStore;
///
/// # tokio_test::block_on(async {
/// let limiter = RateLimiter::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock));
///
/// let decision = limiter.check("203.0.113.7", 60, Duration::from_secs(60)).await;
/// assert!(decision.allowed);
/// assert_eq!(decision.current, 1);
/// # });
/// ```
pub struct RateLimiter {
    store: Arc<dyn AtomicStore>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
}

impl RateLimiter {
    /// Creates a limiter over the given store and clock.
    #[must_use]
    pub fn new(store: Arc<dyn AtomicStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            key_prefix: "folio:rate".to_string(),
        }
    }

    /// Sets the key prefix used in the shared store.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Checks whether `identifier` may make another request.
    ///
    /// Atomically increments the counter for the identifier's current
    /// window and compares against `limit`; the decision's `current` is
    /// the post-increment count.
    pub async fn check(
        &self,
        identifier: &str,
        limit: u64,
        window: Duration,
    ) -> RateLimitDecision {
        let window_secs = window.as_secs().max(1);
        let now = self.clock.unix_secs();
        let bucket = now / window_secs;
        let reset_at = (bucket + 1) * window_secs;
        let key = format!("{}:{identifier}:{bucket}", self.key_prefix);

        // The counter must not outlive its window.
        let ttl = Duration::from_secs(reset_at.saturating_sub(now).max(1));

        match self.store.increment(&key, ttl).await {
            Ok(current) => {
                let allowed = current <= limit;
                if !allowed {
                    counter!("folio_rate_limit_rejections_total").increment(1);
                }
                RateLimitDecision {
                    allowed,
                    current,
                    limit,
                    reset_at,
                }
            }
            Err(e) => {
                // Fail open: the limiter protects the service, it must
                // not become the outage itself.
                tracing::warn!(identifier, error = %e, "rate limit store unavailable, allowing request");
                counter!("folio_rate_limit_store_failures_total").increment(1);
                RateLimitDecision {
                    allowed: true,
                    current: 0,
                    limit,
                    reset_at,
                }
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{BoxFuture, ManualClock};
    use folio_store::{MemoryStore, StoreError, StoreResult};

    const WINDOW: Duration = Duration::from_secs(60);

    fn limiter_at(unix_secs: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at_unix(unix_secs));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (RateLimiter::new(store, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_first_request_allowed() {
        let (limiter, _clock) = limiter_at(1_000);
        let decision = limiter.check("1.2.3.4", 60, WINDOW).await;
        assert!(decision.allowed);
        assert_eq!(decision.current, 1);
        assert_eq!(decision.remaining(), 59);
    }

    #[tokio::test]
    async fn test_sixty_first_request_denied() {
        let (limiter, _clock) = limiter_at(1_000);

        for _ in 0..60 {
            assert!(limiter.check("1.2.3.4", 60, WINDOW).await.allowed);
        }

        let denied = limiter.check("1.2.3.4", 60, WINDOW).await;
        assert!(!denied.allowed);
        // The denied attempt itself still counts.
        assert_eq!(denied.current, 61);
        assert!(denied.reset_at > 1_000, "reset must lie in the future");
    }

    #[tokio::test]
    async fn test_identifiers_do_not_share_state() {
        let (limiter, _clock) = limiter_at(1_000);

        for _ in 0..=60 {
            limiter.check("1.2.3.4", 60, WINDOW).await;
        }
        assert!(!limiter.check("1.2.3.4", 60, WINDOW).await.allowed);

        let other = limiter.check("5.6.7.8", 60, WINDOW).await;
        assert!(other.allowed, "a different identifier has its own window");
        assert_eq!(other.current, 1);
    }

    #[tokio::test]
    async fn test_window_elapse_resets_counter() {
        let (limiter, clock) = limiter_at(1_020);

        for _ in 0..=3 {
            limiter.check("1.2.3.4", 3, WINDOW).await;
        }
        assert!(!limiter.check("1.2.3.4", 3, WINDOW).await.allowed);

        clock.advance(Duration::from_secs(60));
        let decision = limiter.check("1.2.3.4", 3, WINDOW).await;
        assert!(decision.allowed);
        assert_eq!(decision.current, 1);
    }

    #[tokio::test]
    async fn test_reset_at_is_window_aligned() {
        // Window buckets align to the epoch, not to the first request:
        // at t=1990 with a 60s window the bucket spans [1980, 2040).
        let (limiter, _clock) = limiter_at(1_990);
        let decision = limiter.check("1.2.3.4", 60, WINDOW).await;
        assert_eq!(decision.reset_at, 2_040);
        assert_eq!(decision.retry_after(1_990), 50);
    }

    #[tokio::test]
    async fn test_retry_after_is_at_least_one_second() {
        let decision = RateLimitDecision {
            allowed: false,
            current: 61,
            limit: 60,
            reset_at: 1_000,
        };
        assert_eq!(decision.retry_after(1_000), 1);
        assert_eq!(decision.retry_after(2_000), 1);
    }

    struct BrokenStore;

    impl folio_store::AtomicStore for BrokenStore {
        fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, StoreResult<Option<String>>> {
            Box::pin(async { Err(StoreError::Unavailable("down".into())) })
        }

        fn put<'a>(
            &'a self,
            _key: &'a str,
            _value: &'a str,
            _ttl: Duration,
        ) -> BoxFuture<'a, StoreResult<()>> {
            Box::pin(async { Err(StoreError::Unavailable("down".into())) })
        }

        fn put_if_absent<'a>(
            &'a self,
            _key: &'a str,
            _value: &'a str,
            _ttl: Duration,
        ) -> BoxFuture<'a, StoreResult<bool>> {
            Box::pin(async { Err(StoreError::Unavailable("down".into())) })
        }

        fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, StoreResult<()>> {
            Box::pin(async { Err(StoreError::Unavailable("down".into())) })
        }

        fn increment<'a>(
            &'a self,
            _key: &'a str,
            _ttl: Duration,
        ) -> BoxFuture<'a, StoreResult<u64>> {
            Box::pin(async { Err(StoreError::Unavailable("down".into())) })
        }

        fn unlock<'a>(
            &'a self,
            _key: &'a str,
            _token: &'a str,
        ) -> BoxFuture<'a, StoreResult<()>> {
            Box::pin(async { Err(StoreError::Unavailable("down".into())) })
        }
    }

    #[tokio::test]
    async fn test_store_outage_fails_open() {
        let clock = Arc::new(ManualClock::starting_at_unix(1_000));
        let limiter = RateLimiter::new(Arc::new(BrokenStore), clock);

        let decision = limiter.check("1.2.3.4", 60, WINDOW).await;
        assert!(decision.allowed, "the limiter must never become the outage");
    }
}

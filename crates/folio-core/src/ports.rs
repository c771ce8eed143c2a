//! Constructor-injected ports.
//!
//! The pipeline and its services never resolve collaborators from shared
//! global state; the clock and the transactional unit of work are passed
//! in explicitly at construction time. The store port lives in
//! `folio-store`, away from the core vocabulary.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use thiserror::Error;

/// A boxed future, used by object-safe port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A source of wall-clock time.
///
/// Injected wherever window math or TTLs are computed so tests can drive
/// time deterministically.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;

    /// Returns the current time as whole seconds since the Unix epoch.
    fn unix_secs(&self) -> u64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// The production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A manually-driven clock for tests.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use folio_core::{Clock, ManualClock};
///
/// let clock = ManualClock::starting_at_unix(1_000);
/// assert_eq!(clock.unix_secs(), 1_000);
///
/// clock.advance(Duration::from_secs(61));
/// assert_eq!(clock.unix_secs(), 1_061);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    #[must_use]
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock frozen at the given Unix timestamp.
    #[must_use]
    pub fn starting_at_unix(secs: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// A failure reported by the transaction port.
#[derive(Debug, Error)]
#[error("transaction failed: {0}")]
pub struct TransactionError(pub String);

/// The atomic unit-of-work port wrapped around handler invocation.
///
/// The transaction stage calls `begin` before invoking the rest of the
/// chain, `commit` on success, and `rollback` on any raised error before
/// propagating it further, exactly once each.
pub trait UnitOfWork: Send + Sync + 'static {
    /// Opens a new atomic unit of work.
    fn begin(&self) -> BoxFuture<'_, Result<(), TransactionError>>;

    /// Commits the current unit of work.
    fn commit(&self) -> BoxFuture<'_, Result<(), TransactionError>>;

    /// Rolls back the current unit of work.
    fn rollback(&self) -> BoxFuture<'_, Result<(), TransactionError>>;
}

/// A unit of work that does nothing.
///
/// For deployments whose store is externally atomic and needs no
/// surrounding transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUnitOfWork;

impl UnitOfWork for NoopUnitOfWork {
    fn begin(&self) -> BoxFuture<'_, Result<(), TransactionError>> {
        Box::pin(async { Ok(()) })
    }

    fn commit(&self) -> BoxFuture<'_, Result<(), TransactionError>> {
        Box::pin(async { Ok(()) })
    }

    fn rollback(&self) -> BoxFuture<'_, Result<(), TransactionError>> {
        Box::pin(async { Ok(()) })
    }
}

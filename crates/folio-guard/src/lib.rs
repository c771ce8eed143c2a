//! Request guards: idempotency and rate limiting.
//!
//! Both services coordinate exclusively through the
//! [`AtomicStore`](folio_store::AtomicStore) port — the process holds no
//! authoritative state of its own, so any number of replicas can share
//! one store and observe the same locks, records, and counters.
//!
//! - [`IdempotencyService`] — at-most-once execution per caller-supplied
//!   key: a short-TTL lock serializes concurrent attempts, a long-TTL
//!   record replays the stored result after completion.
//! - [`RateLimiter`] — fixed counting windows per caller identifier;
//!   returns a structured [`RateLimitDecision`] and never fails a
//!   request on its own.

pub mod idempotency;
pub mod rate_limiter;
pub mod record;

pub use idempotency::{IdempotencyConfig, IdempotencyService, LockToken};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use record::{IdempotencyRecord, RecordStatus};

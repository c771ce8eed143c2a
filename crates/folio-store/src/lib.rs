//! The atomic key-value store port and its backends.
//!
//! Folio's core holds no authoritative state of its own: lock state,
//! idempotency records, and rate counters all live behind the
//! [`AtomicStore`] contract. Two backends ship here:
//!
//! - [`MemoryStore`] — in-process, for tests and single-node development
//! - [`RedisStore`] — the production backend
//!
//! Store unavailability is a first-class error ([`StoreError`]), never a
//! crash; callers decide whether to fail closed (idempotency guard) or
//! open (rate limiter).

pub mod memory;
pub mod redis;
pub mod store;

pub use memory::MemoryStore;
pub use store::{AtomicStore, StoreError, StoreResult};

pub use crate::redis::RedisStore;

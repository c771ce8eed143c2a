//! Built-in pipeline stages.
//!
//! Conventional order, outermost first: tracing, error translation,
//! idempotency, transaction. The pipeline does not enforce this order;
//! it is what the transport layer assembles by default.

mod error_translation;
mod idempotency;
mod tracing;
mod transaction;

pub use error_translation::ErrorTranslationStage;
pub use idempotency::{CacheOutcome, IdempotencyStage, ReplayedStatus};
pub use self::tracing::TracingStage;
pub use transaction::TransactionStage;

//! Composable command-execution pipeline.
//!
//! A [`Pipeline`] wraps a command handler in an ordered chain of
//! [`Middleware`] stages. Stages are appended with [`Pipeline::pipe`],
//! which returns a new pipeline and leaves the caller's value untouched,
//! so partially-built pipelines can be shared and extended freely.
//!
//! The first stage piped is the outermost: it sees the command first and
//! the result last. Each stage receives a [`Next`] continuation it may
//! decline to call, which is how the idempotency stage replays cached
//! responses without re-invoking the handler.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = Pipeline::new()
//!     .pipe(TracingStage::new())
//!     .pipe(ErrorTranslationStage::new(mappings))
//!     .pipe(IdempotencyStage::new(guard));
//!
//! let output = pipeline.execute(&mut ctx, command, &handler).await?;
//! ```

pub mod middleware;
pub mod pipeline;
pub mod stages;

pub use middleware::{Middleware, Next};
pub use pipeline::Pipeline;
pub use stages::{
    CacheOutcome, ErrorTranslationStage, IdempotencyStage, ReplayedStatus, TracingStage,
    TransactionStage,
};

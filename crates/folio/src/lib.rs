//! # Folio
//!
//! A catalog service built around an idempotent command pipeline.
//!
//! Every mutation is a typed command executed through an immutable chain
//! of middleware stages:
//!
//! ```text
//! Request → Tracing → ErrorTranslation → Idempotency → Transaction → Handler
//! ```
//!
//! The pipeline guarantees that no raw domain error ever crosses the
//! boundary untranslated, that a retried request with the same
//! `Idempotency-Key` replays the stored response instead of re-running
//! its handler, and that callers over their per-window request budget
//! receive `429` with a precise `Retry-After`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use folio::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder()
//!         .http_addr("0.0.0.0:8080")
//!         .build();
//!
//!     let store = Arc::new(MemoryStore::new());
//!     Server::new(config, store)?.run().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

// Re-export the command, context and error types
pub use folio_core as core;

// Re-export the atomic store backends
pub use folio_store as store;

// Re-export the idempotency guard and rate limiter
pub use folio_guard as guard;

// Re-export the middleware pipeline
pub use folio_pipeline as pipeline;

// Re-export logging and metrics setup
pub use folio_telemetry as telemetry;

// Re-export the HTTP server
pub use folio_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use folio::prelude::*;
/// ```
pub mod prelude {
    pub use folio_core::{
        Command, CommandError, CommandHandler, CommandResult, DomainError, ErrorCategory,
        ErrorMappings, ExecutionContext, NoContent, RequestId,
    };

    pub use folio_store::{AtomicStore, MemoryStore, RedisStore, StoreError};

    pub use folio_guard::{
        IdempotencyConfig, IdempotencyService, LockToken, RateLimitDecision, RateLimiter,
    };

    pub use folio_pipeline::{
        CacheOutcome, ErrorTranslationStage, IdempotencyStage, Middleware, Next, Pipeline,
        ReplayedStatus, TracingStage, TransactionStage,
    };

    pub use folio_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};

    pub use folio_server::{RateLimitConfig, Server, ServerConfig, ShutdownSignal};
}

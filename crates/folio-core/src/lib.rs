//! Core types for the Folio command-execution pipeline.
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//!
//! - [`Command`] — immutable intent value objects, one type per operation
//! - [`CommandHandler`] — executes exactly one command type
//! - [`ExecutionContext`] — per-execution state threaded through the pipeline
//! - The error taxonomy: [`DomainError`], [`ApplicationError`],
//!   [`GuardError`], and the boundary type [`CommandError`]
//! - [`ErrorMappings`] — the startup-built domain-to-application mapping table
//! - The [`Clock`] and [`UnitOfWork`] ports
//!
//! No infrastructure lives here; backends and transports depend on this
//! crate, never the other way around.

pub mod command;
pub mod context;
pub mod error;
pub mod handler;
pub mod mapping;
pub mod ports;

pub use command::Command;
pub use context::{ExecutionContext, RequestId};
pub use error::{
    ApplicationError, CommandError, CommandResult, DomainError, ErrorCategory, GuardError,
};
pub use handler::{CommandHandler, FnHandler, NoContent};
pub use mapping::{ErrorMapping, ErrorMappings, MappingError};
pub use ports::{BoxFuture, Clock, ManualClock, NoopUnitOfWork, SystemClock, TransactionError, UnitOfWork};

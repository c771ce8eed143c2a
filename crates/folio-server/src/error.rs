//! Server error types.

use thiserror::Error;

/// Failures starting or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind: {0}")]
    Bind(String),

    /// The startup error-mapping table is invalid.
    #[error("invalid error mappings: {0}")]
    Mappings(#[from] folio_core::MappingError),

    /// Telemetry initialisation failed.
    #[error(transparent)]
    Telemetry(#[from] folio_telemetry::TelemetryError),

    /// The shared store could not be reached.
    #[error("store connection failed: {0}")]
    Store(String),

    /// An I/O failure outside of individual connections.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

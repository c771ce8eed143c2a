//! Telemetry error types.

use thiserror::Error;

/// Failures during telemetry initialisation.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The metrics exporter could not be installed.
    #[error("failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// The logging subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// The listen address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

//! Telemetry bootstrap for Folio services.
//!
//! Two concerns, both initialised once at process start:
//!
//! - [`logging`] — `tracing-subscriber` with JSON output for production
//!   and pretty output for development;
//! - [`metrics`] — the Prometheus exporter behind the `metrics` facade.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

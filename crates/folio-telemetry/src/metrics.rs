//! Prometheus metrics behind the `metrics` facade.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `folio_commands_total` | Counter | `command` |
//! | `folio_command_failures_total` | Counter | `command` |
//! | `folio_idempotency_replays_total` | Counter | - |
//! | `folio_idempotency_conflicts_total` | Counter | - |
//! | `folio_rate_limit_rejections_total` | Counter | - |
//! | `folio_rate_limit_store_failures_total` | Counter | - |
//! | `folio_http_requests_total` | Counter | `method` |
//!
//! The counters are incremented at their call sites throughout the
//! workspace; this module installs the recorder and describes them.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the exporter is installed at all.
    pub enabled: bool,

    /// Address the Prometheus scrape endpoint listens on.
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Disables the exporter.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            addr: String::new(),
        }
    }

    /// Overrides the scrape endpoint address.
    #[must_use]
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }
}

/// Installs the Prometheus recorder and scrape endpoint.
///
/// A no-op when `config.enabled` is false.
///
/// # Errors
///
/// [`TelemetryError::InvalidAddress`] for an unparseable listen address,
/// [`TelemetryError::MetricsInit`] when the recorder cannot be
/// installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    describe_metrics();

    Ok(())
}

/// Renders the current metrics in Prometheus text format.
///
/// Returns `None` before [`init_metrics`] has run.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(
        "folio_commands_total",
        "Commands entering the execution pipeline"
    );
    describe_counter!(
        "folio_command_failures_total",
        "Commands whose execution ended in an error"
    );
    describe_counter!(
        "folio_idempotency_replays_total",
        "Guarded executions answered from the stored response"
    );
    describe_counter!(
        "folio_idempotency_conflicts_total",
        "Guarded executions rejected because the key was in flight"
    );
    describe_counter!(
        "folio_rate_limit_rejections_total",
        "Requests denied by the rate limiter"
    );
    describe_counter!(
        "folio_rate_limit_store_failures_total",
        "Rate-limit checks answered fail-open due to store errors"
    );
    describe_counter!("folio_http_requests_total", "HTTP requests served");
}

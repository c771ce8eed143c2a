//! The folio catalog service binary.
//!
//! Configuration comes from the environment:
//!
//! - `FOLIO_ADDR` — listen address (default `127.0.0.1:8080`)
//! - `FOLIO_LOG` — log level or filter directive (default `info`)
//! - `FOLIO_LOG_FORMAT` — `json` (default) or `pretty`
//! - `FOLIO_METRICS_ADDR` — Prometheus scrape address, empty to disable
//! - `REDIS_URL` — shared store URL; falls back to the in-process store
//!   when unset, which limits idempotency and rate limiting to a single
//!   instance

use std::sync::Arc;

use folio_server::{Server, ServerConfig, ServerError};
use folio_store::{AtomicStore, MemoryStore, RedisStore};
use folio_telemetry::{init_logging, init_metrics, LogConfig, MetricsConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be up yet when this fires.
        eprintln!("folio: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let log_config = log_config_from_env();
    init_logging(&log_config)?;
    init_metrics(&metrics_config_from_env())?;

    let config = ServerConfig::builder()
        .http_addr(env_or("FOLIO_ADDR", "127.0.0.1:8080"))
        .build();

    let store = store_from_env().await?;
    let server = Server::new(config, store)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting folio");
    server.run().await
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn log_config_from_env() -> LogConfig {
    let base = match std::env::var("FOLIO_LOG_FORMAT").as_deref() {
        Ok("pretty") => LogConfig::development(),
        _ => LogConfig::production(),
    };
    match std::env::var("FOLIO_LOG") {
        Ok(level) => base.with_level(level),
        Err(_) => base,
    }
}

fn metrics_config_from_env() -> MetricsConfig {
    match std::env::var("FOLIO_METRICS_ADDR") {
        Ok(addr) if !addr.is_empty() => MetricsConfig::default().with_addr(addr),
        Ok(_) => MetricsConfig::disabled(),
        Err(_) => MetricsConfig::default(),
    }
}

async fn store_from_env() -> Result<Arc<dyn AtomicStore>, ServerError> {
    match std::env::var("REDIS_URL") {
        Ok(url) => {
            let store = RedisStore::connect(&url)
                .await
                .map_err(|e| ServerError::Store(e.to_string()))?;
            tracing::info!("using redis store");
            Ok(Arc::new(store))
        }
        Err(_) => {
            tracing::warn!("REDIS_URL not set, using the in-process store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

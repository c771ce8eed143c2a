//! HTTP transport boundary for the folio catalog service.
//!
//! Wires the command pipeline, the idempotency guard and the rate
//! limiter behind a small REST surface:
//!
//! - `POST /books`, `PUT /books/{id}`, `DELETE /books/{id}` run the full
//!   middleware pipeline and honor the `Idempotency-Key` header;
//! - `GET /books/{id}` reads directly from the repository;
//! - `GET /healthz`, `GET /readyz` and `GET /metrics` are built-in and
//!   bypass the rate limiter.

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod health;
pub mod response;
pub mod server;
pub mod shutdown;

pub use catalog::{catalog_mappings, Book, BookRepository, CatalogApp};
pub use config::{RateLimitConfig, ServerConfig, ServerConfigBuilder};
pub use error::ServerError;
pub use filter::RateLimitFilter;
pub use health::{HealthCheck, ReadinessCheck};
pub use server::Server;
pub use shutdown::{ConnectionTracker, ShutdownSignal};

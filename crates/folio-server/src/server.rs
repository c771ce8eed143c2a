//! The HTTP transport boundary.
//!
//! Built on Hyper and Tokio. Each incoming request passes the rate-limit
//! filter first, then is routed to the catalog pipeline for mutations or
//! straight to the repository for reads. The server owns graceful
//! shutdown: on SIGTERM/SIGINT it stops accepting, flips readiness to
//! not-ready and drains in-flight connections up to the configured
//! timeout.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use folio_core::ExecutionContext;
use folio_guard::{IdempotencyService, RateLimiter};
use folio_pipeline::{CacheOutcome, ReplayedStatus};
use http::{header::HeaderValue, Method, Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use metrics::counter;
use serde::Deserialize;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::catalog::{CatalogApp, CreateBook, DeleteBook, UpdateBook};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::filter::{self, RateLimitFilter};
use crate::health::{HealthCheck, ReadinessCheck};
use crate::response::{self, HttpResponse};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The catalog HTTP server.
///
/// # Example
///
/// ```rust,ignore
/// use folio_server::{Server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::builder()
///         .http_addr("0.0.0.0:8080")
///         .build();
///
///     let store = std::sync::Arc::new(folio_store::MemoryStore::new());
///     let server = Server::new(config, store)?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

/// Shared per-request state.
struct AppState {
    app: CatalogApp,
    filter: RateLimitFilter,
    health: HealthCheck,
    readiness: ReadinessCheck,
    request_timeout: std::time::Duration,
}

impl Server {
    /// Wires the full application over a shared atomic store.
    ///
    /// The same store backs both the idempotency guard and the rate
    /// limiter, exactly as a shared Redis would in production.
    ///
    /// # Errors
    ///
    /// [`ServerError::Mappings`] if the catalog error table is invalid.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn folio_store::AtomicStore>,
    ) -> Result<Self, ServerError> {
        let clock: Arc<dyn folio_core::Clock> = Arc::new(folio_core::SystemClock);

        let guard = Arc::new(IdempotencyService::new(
            store.clone(),
            folio_guard::IdempotencyConfig::default(),
        ));
        let limiter = Arc::new(RateLimiter::new(store, clock.clone()));

        let app = CatalogApp::new(guard)?;
        let filter = RateLimitFilter::new(limiter, clock, config.rate_limit().clone());

        let state = Arc::new(AppState {
            app,
            filter,
            health: HealthCheck::new("folio", env!("CARGO_PKG_VERSION")),
            readiness: ReadinessCheck::new(),
            request_timeout: config.request_timeout(),
        });

        Ok(Self { config, state })
    }

    /// Returns a reference to the readiness check.
    #[must_use]
    pub fn readiness(&self) -> &ReadinessCheck {
        &self.state.readiness
    }

    /// Returns a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the listen address is invalid or taken.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Runs the server with a caller-controlled shutdown signal.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] when the listen address is invalid or taken.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!(
                "invalid address '{}': {e}",
                self.config.http_addr()
            ))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind to {addr}: {e}")))?;

        tracing::info!(%addr, "server listening");
        self.state.readiness.set_ready(true);

        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let state = Arc::clone(&self.state);
                            let token = tracker.acquire();
                            let conn_shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(state, stream, peer, conn_shutdown).await
                                {
                                    tracing::error!(%peer, error = %e, "connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    tracing::info!("shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        self.state.readiness.set_ready(false);

        let timeout = self.config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            ?timeout,
            "draining in-flight connections"
        );

        tokio::select! {
            () = tracker.wait_for_drain() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached with connections still active"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

async fn handle_connection(
    state: Arc<AppState>,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(handle_request(state, peer, req).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);

    tokio::select! {
        result = conn => result,
        _ = shutdown.recv() => {
            tracing::debug!(%peer, "connection closed during shutdown");
            Ok(())
        }
    }
}

/// The routing table.
///
/// Built-in endpoints short-circuit before the rate-limit filter so a
/// noisy client cannot starve health probes.
async fn handle_request(
    state: Arc<AppState>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> HttpResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    counter!("folio_http_requests_total", "method" => method.to_string()).increment(1);
    tracing::debug!(%method, %path, "incoming request");

    match (method.as_str(), path.as_str()) {
        ("GET", "/healthz") => {
            return response::json(StatusCode::OK, &state.health.status());
        }
        ("GET", "/readyz") => return readyz(&state),
        ("GET", "/metrics") => return metrics_endpoint(),
        _ => {}
    }

    let decision = match state.filter.check(req.headers(), peer).await {
        Ok(decision) => decision,
        Err(rejected) => return rejected,
    };

    let mut response = route(state, method, &path, req).await;

    if let Some(decision) = decision {
        filter::apply_rate_limit_headers(&mut response, &decision);
    }
    response
}

async fn route(
    state: Arc<AppState>,
    method: Method,
    path: &str,
    req: Request<Incoming>,
) -> HttpResponse {
    match (method.as_str(), book_id(path)) {
        ("POST", None) if path == "/books" => create_book(&state, req).await,
        ("GET", Some(id)) => get_book(&state, id),
        ("PUT", Some(id)) => update_book(&state, id, req).await,
        ("DELETE", Some(id)) => delete_book(&state, id, req).await,
        _ => not_found(),
    }
}

/// Matches `/books/{uuid}` and extracts the id.
fn book_id(path: &str) -> Option<Uuid> {
    path.strip_prefix("/books/")
        .filter(|rest| !rest.contains('/'))
        .and_then(|rest| Uuid::parse_str(rest).ok())
}

#[derive(Deserialize)]
struct UpdateBookBody {
    title: String,
}

async fn create_book(state: &AppState, req: Request<Incoming>) -> HttpResponse {
    let (mut ctx, body) = match prepare(state, req).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let command: CreateBook = match serde_json::from_slice(&body) {
        Ok(command) => command,
        Err(e) => return bad_request(&e),
    };

    let result = state.app.create(&mut ctx, command).await;
    finish(&mut ctx, result.map(|book| (StatusCode::CREATED, Some(book))))
}

async fn update_book(state: &AppState, id: Uuid, req: Request<Incoming>) -> HttpResponse {
    let (mut ctx, body) = match prepare(state, req).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let body: UpdateBookBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => return bad_request(&e),
    };

    let command = UpdateBook {
        id,
        title: body.title,
    };
    let result = state.app.update(&mut ctx, command).await;
    finish(&mut ctx, result.map(|book| (StatusCode::OK, Some(book))))
}

async fn delete_book(state: &AppState, id: Uuid, req: Request<Incoming>) -> HttpResponse {
    let mut ctx = context_for(&req);

    let result = state.app.delete(&mut ctx, DeleteBook { id }).await;
    finish(
        &mut ctx,
        result.map(|_| (StatusCode::NO_CONTENT, None::<crate::catalog::Book>)),
    )
}

fn get_book(state: &AppState, id: Uuid) -> HttpResponse {
    match state.app.repo().get(id) {
        Some(book) => response::json(StatusCode::OK, &book),
        None => response::error(
            StatusCode::NOT_FOUND,
            "book.not_found",
            format!("no book with id {id}"),
        ),
    }
}

/// Builds the execution context and collects the request body.
async fn prepare(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<(ExecutionContext, Bytes), HttpResponse> {
    let ctx = context_for(&req);

    let collected = tokio::time::timeout(state.request_timeout, req.into_body().collect()).await;
    let body = match collected {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to read request body");
            return Err(response::error(
                StatusCode::BAD_REQUEST,
                "body_unreadable",
                format!("failed to read request body: {e}"),
            ));
        }
        Err(_) => {
            tracing::warn!("request body collection timed out");
            return Err(response::error(
                StatusCode::REQUEST_TIMEOUT,
                "request_timeout",
                "request body collection timed out".to_string(),
            ));
        }
    };

    Ok((ctx, body))
}

fn context_for<B>(req: &Request<B>) -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    if let Some(key) = filter::idempotency_key(req.headers()) {
        ctx.set_idempotency_key(key);
    }
    ctx
}

/// Renders a pipeline result, stamping the idempotency cache header
/// when the stage recorded an outcome. A replayed execution answers
/// with the status the original execution recorded.
fn finish<T: serde::Serialize>(
    ctx: &mut ExecutionContext,
    result: Result<(StatusCode, Option<T>), folio_core::CommandError>,
) -> HttpResponse {
    let replayed = ctx
        .remove_extension::<ReplayedStatus>()
        .and_then(|r| StatusCode::from_u16(r.0).ok());

    let mut response = match result {
        Ok((status, Some(payload))) => response::json(replayed.unwrap_or(status), &payload),
        Ok((status, None)) => response::with_body(replayed.unwrap_or(status), Bytes::new()),
        Err(err) => response::command_error(&err),
    };

    if let Some(outcome) = ctx.remove_extension::<CacheOutcome>() {
        response.headers_mut().insert(
            filter::IDEMPOTENCY_CACHE,
            HeaderValue::from_static(outcome.as_str()),
        );
    }
    response
}

fn readyz(state: &AppState) -> HttpResponse {
    if state.readiness.is_ready() {
        response::json(StatusCode::OK, &serde_json::json!({ "ready": true }))
    } else {
        response::json(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({ "ready": false }),
        )
    }
}

fn metrics_endpoint() -> HttpResponse {
    match folio_telemetry::render_metrics() {
        Some(text) => {
            let mut response = response::with_body(StatusCode::OK, Bytes::from(text));
            response.headers_mut().insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        None => response::error(
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics_unavailable",
            "the metrics recorder is not installed".to_string(),
        ),
    }
}

fn bad_request(err: &serde_json::Error) -> HttpResponse {
    response::error(
        StatusCode::BAD_REQUEST,
        "bad_request",
        format!("invalid request body: {err}"),
    )
}

fn not_found() -> HttpResponse {
    response::error(
        StatusCode::NOT_FOUND,
        "route_not_found",
        "no such route".to_string(),
    )
}

//! Transport-edge request filtering.
//!
//! Runs before the command pipeline: per-client rate limiting and
//! idempotency header extraction. Denials are rendered here; allowed
//! requests carry their [`RateLimitDecision`] forward so the final
//! response can advertise the remaining budget.

use crate::config::RateLimitConfig;
use crate::response::{self, HttpResponse};
use bytes::Bytes;
use folio_core::Clock;
use folio_guard::{RateLimitDecision, RateLimiter};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

/// Request header selecting the idempotency guard path.
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

/// Response header reporting whether a guarded execution was replayed.
pub const IDEMPOTENCY_CACHE: &str = "x-idempotency-cache";

/// Rate-limit response header names.
pub mod headers {
    /// Requests allowed per window.
    pub const LIMIT: &str = "x-ratelimit-limit";
    /// Requests left in the current window.
    pub const REMAINING: &str = "x-ratelimit-remaining";
    /// Unix timestamp at which the window resets.
    pub const RESET: &str = "x-ratelimit-reset";
}

/// The per-client rate-limit filter.
pub struct RateLimitFilter {
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

#[derive(Serialize)]
struct RateLimitedBody {
    error: &'static str,
    message: String,
    #[serde(rename = "retryAfter")]
    retry_after: u64,
}

impl RateLimitFilter {
    /// Creates the filter.
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            limiter,
            clock,
            config,
        }
    }

    /// Checks the request against the client's budget.
    ///
    /// `Ok` carries the decision to stamp onto the eventual response;
    /// `Err` carries the finished 429 response.
    pub async fn check(
        &self,
        request_headers: &HeaderMap,
        peer: SocketAddr,
    ) -> Result<Option<RateLimitDecision>, HttpResponse> {
        if !self.config.enabled {
            return Ok(None);
        }

        let identifier = client_identifier(request_headers, peer);
        let decision = self
            .limiter
            .check(&identifier, self.config.limit, self.config.window)
            .await;

        if decision.allowed {
            Ok(Some(decision))
        } else {
            tracing::warn!(
                identifier,
                current = decision.current,
                limit = decision.limit,
                "rate limit exceeded"
            );
            Err(self.rate_limited_response(&decision))
        }
    }

    fn rate_limited_response(&self, decision: &RateLimitDecision) -> HttpResponse {
        let retry_after = decision.retry_after(self.clock.unix_secs());
        let body = RateLimitedBody {
            error: "rate_limited",
            message: format!(
                "rate limit of {} requests per window exceeded",
                decision.limit
            ),
            retry_after,
        };

        let mut response = match serde_json::to_vec(&body) {
            Ok(bytes) => response::with_body(StatusCode::TOO_MANY_REQUESTS, Bytes::from(bytes)),
            Err(_) => response::with_body(StatusCode::TOO_MANY_REQUESTS, Bytes::new()),
        };
        apply_rate_limit_headers(&mut response, decision);
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

/// Stamps the `X-RateLimit-*` headers onto a response.
pub fn apply_rate_limit_headers(response: &mut HttpResponse, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert(headers::LIMIT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining().to_string()) {
        headers.insert(headers::REMAINING, value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_at.to_string()) {
        headers.insert(headers::RESET, value);
    }
}

/// Extracts the idempotency key from the request headers.
#[must_use]
pub fn idempotency_key(request_headers: &HeaderMap) -> Option<String> {
    request_headers
        .get(IDEMPOTENCY_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
}

/// Resolves the client identifier for rate limiting.
///
/// `X-Forwarded-For` (first hop) wins, then `X-Real-IP`, then the peer
/// address.
fn client_identifier(request_headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = request_headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = request_headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.ip().to_string()
}

//! HTTP response rendering.
//!
//! All bodies are JSON. Error envelopes carry a stable `error` code, a
//! human `message`, and (for mapped validation failures) the offending
//! `field`; internal detail never crosses this boundary.

use bytes::Bytes;
use folio_core::{CommandError, GuardError};
use http::{header, Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// The response body type served by this crate.
pub type ResponseBody = Full<Bytes>;

/// The response type served by this crate.
pub type HttpResponse = Response<ResponseBody>;

/// Serializes `value` as a JSON response with the given status.
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, Bytes::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "response body serialization failed");
            with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"internal","message":"internal server error"}"#),
            )
        }
    }
}

/// A response with the given status and a pre-serialized JSON body.
pub fn with_body(status: StatusCode, body: Bytes) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(body))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

/// A plain error envelope with a stable code and human message.
pub fn error(status: StatusCode, code: &str, message: String) -> HttpResponse {
    json(
        status,
        &ErrorEnvelope {
            error: code,
            message,
            field: None,
        },
    )
}

/// Renders a pipeline error as its HTTP response.
///
/// The status comes from [`CommandError::status_code`]; `KeyInProgress`
/// additionally carries a `Retry-After` hint, and `Unexpected` is logged
/// in full while the body stays generic.
pub fn command_error(err: &CommandError) -> HttpResponse {
    let status = err.status_code();

    let envelope = match err {
        CommandError::Application(app) => ErrorEnvelope {
            error: app.code(),
            message: app
                .cause()
                .map_or_else(|| app.code().to_string(), |c| c.message().to_string()),
            field: app.field(),
        },
        CommandError::Guard(GuardError::KeyInProgress { .. }) => ErrorEnvelope {
            error: "key_in_progress",
            message: "a request with this idempotency key is already being processed".to_string(),
            field: None,
        },
        CommandError::Guard(GuardError::StorageUnavailable { .. }) => ErrorEnvelope {
            error: "storage_unavailable",
            message: "the service is temporarily unable to process this request".to_string(),
            field: None,
        },
        CommandError::Domain(_) | CommandError::Unexpected(_) => {
            tracing::error!(error = ?err, "unhandled error at the transport boundary");
            ErrorEnvelope {
                error: "internal",
                message: "internal server error".to_string(),
                field: None,
            }
        }
    };

    let mut response = json(status, &envelope);
    if matches!(err, CommandError::Guard(GuardError::KeyInProgress { .. })) {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{ApplicationError, DomainError, ErrorCategory};

    #[test]
    fn test_application_error_envelope() {
        let err = CommandError::Application(
            ApplicationError::new(ErrorCategory::AlreadyExists, "book.isbn_taken")
                .with_field("isbn")
                .with_cause(DomainError::new("book.isbn_taken", "isbn already registered")),
        );

        let response = command_error(&err);
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_key_in_progress_carries_retry_after() {
        let err = CommandError::Guard(GuardError::key_in_progress("k"));
        let response = command_error(&err);

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "1"
        );
    }

    #[test]
    fn test_unexpected_error_stays_generic() {
        let err = CommandError::unexpected(std::io::Error::new(
            std::io::ErrorKind::Other,
            "secret internal detail",
        ));
        let response = command_error(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

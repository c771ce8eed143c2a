//! The Folio error taxonomy.
//!
//! Three layers, related by the translation table in
//! [`mapping`](crate::mapping):
//!
//! - [`DomainError`] — internal, carries a stable machine-readable code.
//!   Never allowed to cross the pipeline boundary unwrapped.
//! - [`ApplicationError`] — external, carries a category and an optional
//!   field for client-side form binding, with the originating
//!   [`DomainError`] preserved as its source.
//! - [`GuardError`] — the closed error-kind enumeration of the idempotency
//!   guard. Callers switch on the variant, not on a type hierarchy:
//!   `KeyInProgress` is retryable, `StorageUnavailable` is not.
//!
//! [`CommandError`] is the single type the pipeline boundary produces.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline executions.
pub type CommandResult<T> = Result<T, CommandError>;

/// Externally-meaningful error categories.
///
/// Every mapped internal code resolves to exactly one of these; the
/// transport boundary derives the HTTP status from the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The referenced entity does not exist.
    NotFound,
    /// The entity (or a unique attribute of it) already exists.
    AlreadyExists,
    /// The operation could not be carried out.
    OperationFailed,
    /// A business rule rejected the operation.
    BusinessRule,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this category.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// An internal domain error with a stable code.
///
/// Handlers and domain services fail with `DomainError`; the translation
/// stage (or, failing that, the pipeline's own safety net) converts it to
/// an [`ApplicationError`] before it reaches a caller.
///
/// # Example
///
/// ```
/// use folio_core::DomainError;
///
/// let err = DomainError::new("book.not_found", "no book with id 42");
/// assert_eq!(err.code(), "book.not_found");
/// ```
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct DomainError {
    code: String,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

impl DomainError {
    /// Creates a domain error with a stable code and a human message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attaches an underlying cause for diagnostics.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An externally-surfaced application error.
///
/// Carries the mapped [`ErrorCategory`], the optional field name (for
/// client-side form binding), and the originating code as its message.
/// The original [`DomainError`] is preserved as the wrapped cause.
#[derive(Debug, Error)]
#[error("{code}")]
pub struct ApplicationError {
    category: ErrorCategory,
    field: Option<String>,
    code: String,
    #[source]
    cause: Option<DomainError>,
}

impl ApplicationError {
    /// Creates an application error from a category and code.
    #[must_use]
    pub fn new(category: ErrorCategory, code: impl Into<String>) -> Self {
        Self {
            category,
            field: None,
            code: code.into(),
            cause: None,
        }
    }

    /// Sets the mapped field name.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attaches the originating domain error as the wrapped cause.
    #[must_use]
    pub fn with_cause(mut self, cause: DomainError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Builds the generic fallback used by the pipeline's safety net: the
    /// escaping domain error becomes an `OperationFailed` application error
    /// carrying the original code.
    #[must_use]
    pub fn operation_failed(cause: DomainError) -> Self {
        Self {
            category: ErrorCategory::OperationFailed,
            field: None,
            code: cause.code().to_string(),
            cause: Some(cause),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Returns the mapped field name, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Returns the originating error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the wrapped domain error, if preserved.
    #[must_use]
    pub fn cause(&self) -> Option<&DomainError> {
        self.cause.as_ref()
    }
}

/// Failures raised by the idempotency guard.
///
/// A deliberately closed enumeration: the two variants demand different
/// retry policies and callers are expected to match on them.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Another execution currently holds the lock for this key.
    ///
    /// Retryable: the caller should try again once the in-flight execution
    /// finishes (or its lock expires).
    #[error("idempotency key '{key}' is currently being processed")]
    KeyInProgress {
        /// The contended idempotency key.
        key: String,
    },

    /// The guard could not read or persist required state.
    ///
    /// An infrastructure failure, not a business outcome; the execution
    /// state for the key is unknown.
    #[error("idempotency storage unavailable: {reason}")]
    StorageUnavailable {
        /// What the store reported.
        reason: String,
    },
}

impl GuardError {
    /// Creates a `KeyInProgress` error.
    #[must_use]
    pub fn key_in_progress(key: impl Into<String>) -> Self {
        Self::KeyInProgress { key: key.into() }
    }

    /// Creates a `StorageUnavailable` error.
    #[must_use]
    pub fn storage_unavailable(reason: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether the caller may retry the identical request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::KeyInProgress { .. })
    }
}

/// The single error type crossing the pipeline boundary.
#[derive(Debug, Error)]
pub enum CommandError {
    /// An internal domain error still inside the chain.
    ///
    /// The pipeline's safety net guarantees this variant never escapes
    /// [`Pipeline::execute`](https://docs.rs/folio-pipeline) untranslated.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A translated, externally-meaningful error.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// An idempotency guard failure.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// An unexpected non-domain failure.
    ///
    /// Logged with full context at the boundary; callers see only a
    /// generic message.
    #[error("unexpected error")]
    Unexpected(#[source] anyhow::Error),
}

impl CommandError {
    /// Wraps an arbitrary failure as an unexpected error.
    #[must_use]
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(err.into())
    }

    /// Returns the HTTP status the transport boundary renders.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Application(app) => app.category().status_code(),
            Self::Guard(GuardError::KeyInProgress { .. }) => StatusCode::CONFLICT,
            Self::Guard(GuardError::StorageUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Domain(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_code_and_message() {
        let err = DomainError::new("book.isbn_taken", "isbn 978-0 already registered");
        assert_eq!(err.code(), "book.isbn_taken");
        assert_eq!(err.message(), "isbn 978-0 already registered");
        assert!(err.to_string().contains("book.isbn_taken"));
    }

    #[test]
    fn test_domain_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = DomainError::new("book.save_failed", "could not persist").with_source(io);
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
        assert!(source.unwrap().to_string().contains("disk on fire"));
    }

    #[test]
    fn test_application_error_preserves_cause() {
        let domain = DomainError::new("book.not_found", "gone");
        let app = ApplicationError::new(ErrorCategory::NotFound, "book.not_found")
            .with_field("book_id")
            .with_cause(domain);

        assert_eq!(app.category(), ErrorCategory::NotFound);
        assert_eq!(app.field(), Some("book_id"));
        assert_eq!(app.cause().unwrap().code(), "book.not_found");
    }

    #[test]
    fn test_operation_failed_carries_original_code() {
        let domain = DomainError::new("book.edition_closed", "edition is frozen");
        let app = ApplicationError::operation_failed(domain);

        assert_eq!(app.category(), ErrorCategory::OperationFailed);
        assert_eq!(app.code(), "book.edition_closed");
        assert!(app.cause().is_some());
    }

    #[test]
    fn test_guard_error_retryability() {
        assert!(GuardError::key_in_progress("k").is_retryable());
        assert!(!GuardError::storage_unavailable("redis down").is_retryable());
    }

    #[test]
    fn test_category_status_codes() {
        assert_eq!(
            ErrorCategory::NotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCategory::AlreadyExists.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCategory::BusinessRule.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCategory::OperationFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_command_error_status_codes() {
        let in_progress: CommandError = GuardError::key_in_progress("k").into();
        assert_eq!(in_progress.status_code(), StatusCode::CONFLICT);

        let unavailable: CommandError = GuardError::storage_unavailable("down").into();
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let unexpected = CommandError::unexpected(std::io::Error::new(
            std::io::ErrorKind::Other,
            "boom",
        ));
        assert_eq!(unexpected.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

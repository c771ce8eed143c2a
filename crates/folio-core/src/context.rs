//! Execution context types.
//!
//! The [`ExecutionContext`] carries all per-execution state through the
//! middleware pipeline and into handlers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for each execution, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    ///
    /// Useful when the ID was propagated from an upstream service.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-execution context threaded through the middleware pipeline.
///
/// The context is mutable during pipeline processing: stages enrich it
/// (trace correlation, idempotency cache outcome) and the transport
/// boundary reads those enrichments back when building the response.
///
/// # Example
///
/// ```
/// use folio_core::ExecutionContext;
///
/// let ctx = ExecutionContext::new()
///     .with_principal("203.0.113.7")
///     .with_idempotency_key("order-42-create");
///
/// assert_eq!(ctx.principal(), Some("203.0.113.7"));
/// assert_eq!(ctx.idempotency_key(), Some("order-42-create"));
/// ```
#[derive(Debug)]
pub struct ExecutionContext {
    /// Unique identifier for this execution.
    request_id: RequestId,

    /// The identifying principal of the caller (e.g., a client IP).
    principal: Option<String>,

    /// Caller-supplied idempotency key, if any.
    idempotency_key: Option<String>,

    /// When the execution started.
    started_at: Instant,

    /// Type-erased extension data.
    ///
    /// Stages can store arbitrary data here using type-safe keys; the
    /// transport boundary reads them back (e.g., the idempotency cache
    /// outcome for the `X-Idempotency-Cache` header).
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ExecutionContext {
    /// Creates a new context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            principal: None,
            idempotency_key: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            ..Self::new()
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the caller principal, if known.
    #[must_use]
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Sets the caller principal.
    pub fn set_principal(&mut self, principal: impl Into<String>) {
        self.principal = Some(principal.into());
    }

    /// Returns a context with the given principal set.
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Returns the idempotency key, if the caller supplied one.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Sets the idempotency key.
    pub fn set_idempotency_key(&mut self, key: impl Into<String>) {
        self.idempotency_key = Some(key.into());
    }

    /// Returns a context with the given idempotency key set.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Returns when the execution started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the execution started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    ///
    /// # Example
    ///
    /// ```
    /// use folio_core::ExecutionContext;
    ///
    /// #[derive(Clone, PartialEq, Debug)]
    /// struct WindowInfo {
    ///     remaining: u64,
    /// }
    ///
    /// let mut ctx = ExecutionContext::new();
    /// ctx.set_extension(WindowInfo { remaining: 59 });
    ///
    /// assert_eq!(ctx.get_extension::<WindowInfo>().unwrap().remaining, 59);
    /// ```
    pub fn set_extension<T: Any + Send + Sync>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value, if present.
    #[must_use]
    pub fn get_extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Removes and returns a typed extension value, if present.
    pub fn remove_extension<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

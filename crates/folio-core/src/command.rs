//! The command trait.
//!
//! A command is an immutable intent value object: one concrete type per
//! mutating operation, carrying only the operation's inputs. Commands never
//! hold infrastructure references; everything the pipeline needs beyond the
//! inputs travels in the [`ExecutionContext`](crate::ExecutionContext).

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A typed, immutable operation intent.
///
/// Each mutating operation in the system is represented by exactly one
/// command type. The associated [`Output`](Command::Output) is what the
/// handler produces on success; it must round-trip through JSON so the
/// idempotency guard can replay a stored result without re-invoking the
/// handler.
///
/// # Example
///
/// ```
/// use folio_core::Command;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone)]
/// struct RenameShelf {
///     shelf_id: u64,
///     name: String,
/// }
///
/// #[derive(Serialize, Deserialize)]
/// struct ShelfRenamed {
///     shelf_id: u64,
/// }
///
/// impl Command for RenameShelf {
///     type Output = ShelfRenamed;
///
///     fn name(&self) -> &'static str {
///         "RenameShelf"
///     }
///
///     fn supports_idempotency(&self) -> bool {
///         true
///     }
/// }
/// ```
pub trait Command: Send + Sync + 'static {
    /// The result type produced by this command's handler.
    type Output: Serialize + DeserializeOwned + Send + 'static;

    /// Returns the stable operation name.
    ///
    /// Used as the tracing span attribute and in log correlation. Must be
    /// unique across command types.
    fn name(&self) -> &'static str;

    /// Whether this command may be guarded by an idempotency key.
    ///
    /// Commands that return `false` bypass the idempotency stage entirely,
    /// even when the caller supplied an `Idempotency-Key` header.
    fn supports_idempotency(&self) -> bool {
        false
    }
}

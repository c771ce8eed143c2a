//! Handler trait for command execution.
//!
//! The [`CommandHandler`] trait defines the interface for command handlers.
//! A handler executes exactly one command type and either produces the
//! command's output or fails with a [`DomainError`].

use crate::{Command, DomainError, ExecutionContext};
use std::future::Future;

/// A trait for handling one command type.
///
/// Handlers are opaque to the pipeline beyond this contract: accept one
/// command, return its output, or raise one domain error. Cross-cutting
/// behavior (tracing, translation, transactions, idempotency) lives in
/// the pipeline stages, never in handlers.
///
/// # Example
///
/// ```rust,ignore
/// use folio_core::{Command, CommandHandler, DomainError, ExecutionContext};
///
/// struct CreateBookHandler {
///     books: BookRepository,
/// }
///
/// impl CommandHandler<CreateBook> for CreateBookHandler {
///     async fn handle(
///         &self,
///         ctx: &ExecutionContext,
///         command: CreateBook,
///     ) -> Result<BookCreated, DomainError> {
///         self.books.insert(command.title, command.isbn)
///     }
/// }
/// ```
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    /// Executes the command.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] when business validation fails, a
    /// referenced entity is missing, or the operation cannot proceed.
    fn handle(
        &self,
        ctx: &ExecutionContext,
        command: C,
    ) -> impl Future<Output = Result<C::Output, DomainError>> + Send;
}

/// A function-based handler wrapper.
///
/// Allows using async functions directly as handlers.
///
/// # Example
///
/// ```rust,ignore
/// use folio_core::FnHandler;
///
/// async fn create_book(
///     ctx: &ExecutionContext,
///     command: CreateBook,
/// ) -> Result<BookCreated, DomainError> {
///     // ...
/// }
///
/// let handler = FnHandler::new(create_book);
/// ```
pub struct FnHandler<F, C, Fut>
where
    C: Command,
    F: Fn(&ExecutionContext, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C::Output, DomainError>> + Send,
{
    func: F,
    _phantom: std::marker::PhantomData<fn(C) -> Fut>,
}

impl<F, C, Fut> FnHandler<F, C, Fut>
where
    C: Command,
    F: Fn(&ExecutionContext, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C::Output, DomainError>> + Send,
{
    /// Creates a new function-based handler.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self {
            func,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F, C, Fut> CommandHandler<C> for FnHandler<F, C, Fut>
where
    C: Command,
    F: Fn(&ExecutionContext, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C::Output, DomainError>> + Send + 'static,
{
    async fn handle(&self, ctx: &ExecutionContext, command: C) -> Result<C::Output, DomainError> {
        (self.func)(ctx, command).await
    }
}

/// Unit output type for commands that produce no payload.
///
/// Use this for operations that return only a status (e.g., deletions).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NoContent {}

//! The middleware trait and the consume-once continuation.
//!
//! A middleware stage wraps the execution of one command: it runs code
//! before and after the rest of the chain, may enrich the
//! [`ExecutionContext`], and may short-circuit by not calling [`Next`].
//!
//! # Example
//!
//! ```ignore
//! struct TimingStage;
//!
//! impl<C: Command> Middleware<C> for TimingStage {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut ExecutionContext,
//!         command: C,
//!         next: Next<'a, C>,
//!     ) -> BoxFuture<'a, CommandResult<C::Output>> {
//!         Box::pin(async move {
//!             let result = next.run(ctx, command).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "command timed");
//!             result
//!         })
//!     }
//! }
//! ```

use folio_core::{
    BoxFuture, Command, CommandError, CommandHandler, CommandResult, DomainError, ExecutionContext,
};

/// One stage of the command pipeline.
///
/// Stages receive the command by value together with a [`Next`]
/// continuation. Calling `next.run()` hands the command to the rest of
/// the chain; not calling it short-circuits with the stage's own result.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once (`Next` is consume-once).
/// - A stage must not swallow downstream errors silently; transforming
///   them (as the translation stage does) is fine.
pub trait Middleware<C: Command>: Send + Sync + 'static {
    /// Returns the stage name used in logs and pipeline introspection.
    fn name(&self) -> &'static str;

    /// Runs this stage around the rest of the chain.
    fn process<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        command: C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, CommandResult<C::Output>>;
}

/// A type-erased handler at the end of the chain.
///
/// Bridges the generic [`CommandHandler`] trait into something the chain
/// can hold behind a reference.
pub(crate) trait ErasedHandler<C: Command>: Send + Sync {
    fn call<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        command: C,
    ) -> BoxFuture<'a, Result<C::Output, DomainError>>;
}

impl<C, H> ErasedHandler<C> for H
where
    C: Command,
    H: CommandHandler<C>,
{
    fn call<'a>(
        &'a self,
        ctx: &'a ExecutionContext,
        command: C,
    ) -> BoxFuture<'a, Result<C::Output, DomainError>> {
        Box::pin(self.handle(ctx, command))
    }
}

/// The continuation a stage invokes to run the rest of the chain.
///
/// Consumed by [`run`](Next::run), so it can be invoked at most once. A
/// stage that drops it without running it has short-circuited the
/// pipeline.
pub struct Next<'a, C: Command> {
    inner: NextInner<'a, C>,
}

enum NextInner<'a, C: Command> {
    /// More stages ahead of the handler.
    Chain {
        middleware: &'a dyn Middleware<C>,
        next: Box<Next<'a, C>>,
    },
    /// End of the chain: the handler itself.
    Handler(&'a dyn ErasedHandler<C>),
}

impl<'a, C: Command> Next<'a, C> {
    /// Wraps `next` in one more stage.
    pub(crate) fn new(middleware: &'a dyn Middleware<C>, next: Next<'a, C>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates the terminal continuation that invokes the handler.
    pub(crate) fn handler(handler: &'a dyn ErasedHandler<C>) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Runs the remainder of the chain.
    ///
    /// A `DomainError` from the handler surfaces as
    /// [`CommandError::Domain`] so that upstream stages can translate it.
    ///
    /// # Errors
    ///
    /// Whatever the downstream stages or the handler fail with.
    pub async fn run(
        self,
        ctx: &mut ExecutionContext,
        command: C,
    ) -> CommandResult<C::Output> {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, command, *next).await,
            NextInner::Handler(handler) => handler
                .call(ctx, command)
                .await
                .map_err(CommandError::Domain),
        }
    }
}

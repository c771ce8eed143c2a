//! The composable pipeline value.
//!
//! A [`Pipeline`] is an immutable ordered list of stages. [`pipe`]
//! returns a new pipeline with one more stage appended; the original is
//! untouched, so a base pipeline can be shared and specialized per
//! command without coordination.
//!
//! [`pipe`]: Pipeline::pipe

use crate::middleware::{ErasedHandler, Middleware, Next};
use folio_core::{
    ApplicationError, Command, CommandError, CommandHandler, CommandResult, ExecutionContext,
};
use std::sync::Arc;

/// An ordered chain of middleware around one command type's handler.
///
/// The first stage piped is the outermost: it observes the command
/// before every other stage and the result after them.
///
/// # Example
///
/// ```ignore
/// let base = Pipeline::new().pipe(TracingStage::new());
/// let guarded = base.pipe(IdempotencyStage::new(guard));
///
/// // `base` still has one stage; `guarded` has two.
/// assert_eq!(base.stage_count(), 1);
/// assert_eq!(guarded.stage_count(), 2);
/// ```
pub struct Pipeline<C: Command> {
    stages: Vec<Arc<dyn Middleware<C>>>,
}

impl<C: Command> Pipeline<C> {
    /// Creates an empty pipeline that runs the handler directly.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Returns a new pipeline with `middleware` appended.
    ///
    /// The receiver is not modified; stages already piped are shared
    /// between the two values.
    #[must_use]
    pub fn pipe<M: Middleware<C>>(&self, middleware: M) -> Self {
        let mut stages = self.stages.clone();
        stages.push(Arc::new(middleware));
        Self { stages }
    }

    /// Returns the stage names in execution order, outermost first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Executes `command` through every stage and the handler.
    ///
    /// A `DomainError` that escapes the whole chain untranslated is
    /// converted here into a generic `OperationFailed`
    /// [`ApplicationError`] carrying the original code, so callers never
    /// observe a raw domain error.
    ///
    /// # Errors
    ///
    /// Any [`CommandError`] raised by a stage or the handler.
    pub async fn execute<H>(
        &self,
        ctx: &mut ExecutionContext,
        command: C,
        handler: &H,
    ) -> CommandResult<C::Output>
    where
        H: CommandHandler<C>,
    {
        let mut next = Next::handler(handler as &dyn ErasedHandler<C>);
        for stage in self.stages.iter().rev() {
            next = Next::new(stage.as_ref(), next);
        }

        match next.run(ctx, command).await {
            Err(CommandError::Domain(domain)) => {
                Err(ApplicationError::operation_failed(domain).into())
            }
            other => other,
        }
    }
}

impl<C: Command> Clone for Pipeline<C> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<C: Command> Default for Pipeline<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Command> std::fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

//! Domain-to-application error translation stage.

use crate::middleware::{Middleware, Next};
use folio_core::{
    ApplicationError, BoxFuture, Command, CommandError, CommandResult, ErrorMappings,
    ExecutionContext,
};
use std::sync::Arc;

/// Translates escaping domain errors using the startup mapping table.
///
/// A mapped code becomes an [`ApplicationError`] with the registered
/// category and field, the code as its message, and the original domain
/// error preserved as the cause. Unmapped codes are rethrown unchanged;
/// the pipeline's safety net picks those up at the boundary.
///
/// Placed early (right after tracing) so that every inner stage's
/// domain error passes through it on the way out.
pub struct ErrorTranslationStage {
    mappings: Arc<ErrorMappings>,
}

impl ErrorTranslationStage {
    /// Creates the stage over a built mapping table.
    #[must_use]
    pub fn new(mappings: Arc<ErrorMappings>) -> Self {
        Self { mappings }
    }
}

impl<C: Command> Middleware<C> for ErrorTranslationStage {
    fn name(&self) -> &'static str {
        "error_translation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        command: C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, CommandResult<C::Output>> {
        Box::pin(async move {
            match next.run(ctx, command).await {
                Err(CommandError::Domain(domain)) => {
                    match self.mappings.lookup(domain.code()) {
                        Some(mapping) => {
                            let mut app = ApplicationError::new(mapping.category, domain.code());
                            if let Some(field) = mapping.field {
                                app = app.with_field(field);
                            }
                            Err(CommandError::Application(app.with_cause(domain)))
                        }
                        None => Err(CommandError::Domain(domain)),
                    }
                }
                other => other,
            }
        })
    }
}

impl std::fmt::Debug for ErrorTranslationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTranslationStage")
            .field("mappings", &self.mappings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pipeline;
    use folio_core::{CommandHandler, DomainError, ErrorCategory};
    use serde::{Deserialize, Serialize};

    #[derive(Debug)]
    struct Reserve;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reserved;

    impl Command for Reserve {
        type Output = Reserved;

        fn name(&self) -> &'static str {
            "Reserve"
        }
    }

    struct FailWith(&'static str);

    impl CommandHandler<Reserve> for FailWith {
        async fn handle(
            &self,
            _ctx: &ExecutionContext,
            _command: Reserve,
        ) -> Result<Reserved, DomainError> {
            Err(DomainError::new(self.0, "rejected"))
        }
    }

    fn mappings() -> Arc<ErrorMappings> {
        Arc::new(
            ErrorMappings::builder()
                .map("seat.taken", ErrorCategory::AlreadyExists, Some("seat"))
                .map("seat.unknown", ErrorCategory::NotFound, None)
                .build()
                .expect("no duplicate codes"),
        )
    }

    #[tokio::test]
    async fn test_mapped_code_gets_category_and_field() {
        let pipeline = Pipeline::new().pipe(ErrorTranslationStage::new(mappings()));
        let mut ctx = ExecutionContext::new();

        let err = pipeline
            .execute(&mut ctx, Reserve, &FailWith("seat.taken"))
            .await
            .unwrap_err();

        match err {
            CommandError::Application(app) => {
                assert_eq!(app.category(), ErrorCategory::AlreadyExists);
                assert_eq!(app.field(), Some("seat"));
                assert_eq!(app.code(), "seat.taken");
                assert_eq!(app.cause().unwrap().message(), "rejected");
            }
            other => panic!("expected an application error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unmapped_code_falls_through_to_safety_net() {
        let pipeline = Pipeline::new().pipe(ErrorTranslationStage::new(mappings()));
        let mut ctx = ExecutionContext::new();

        let err = pipeline
            .execute(&mut ctx, Reserve, &FailWith("seat.on_fire"))
            .await
            .unwrap_err();

        // Untranslated by the stage, wrapped generically by the pipeline.
        match err {
            CommandError::Application(app) => {
                assert_eq!(app.category(), ErrorCategory::OperationFailed);
                assert_eq!(app.code(), "seat.on_fire");
            }
            other => panic!("expected an application error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_is_untouched() {
        struct Succeeding;

        impl CommandHandler<Reserve> for Succeeding {
            async fn handle(
                &self,
                _ctx: &ExecutionContext,
                _command: Reserve,
            ) -> Result<Reserved, DomainError> {
                Ok(Reserved)
            }
        }

        let pipeline = Pipeline::new().pipe(ErrorTranslationStage::new(mappings()));
        let mut ctx = ExecutionContext::new();

        let result = pipeline.execute(&mut ctx, Reserve, &Succeeding).await;
        assert_eq!(result.unwrap(), Reserved);
    }
}

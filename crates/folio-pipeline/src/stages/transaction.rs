//! Unit-of-work stage.

use crate::middleware::{Middleware, Next};
use folio_core::{BoxFuture, Command, CommandError, CommandResult, ExecutionContext, UnitOfWork};
use std::sync::Arc;

/// Wraps the rest of the chain in a transaction.
///
/// `begin` before `next`, `commit` after success, `rollback` after
/// failure, each exactly once. A rollback failure is logged and the
/// original command error still propagates.
///
/// Stores that are atomic on their own use
/// [`NoopUnitOfWork`](folio_core::NoopUnitOfWork).
pub struct TransactionStage {
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl TransactionStage {
    /// Creates the stage over a unit-of-work port.
    #[must_use]
    pub fn new(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { unit_of_work }
    }
}

impl<C: Command> Middleware<C> for TransactionStage {
    fn name(&self) -> &'static str {
        "transaction"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        command: C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, CommandResult<C::Output>> {
        Box::pin(async move {
            self.unit_of_work
                .begin()
                .await
                .map_err(CommandError::unexpected)?;

            match next.run(ctx, command).await {
                Ok(output) => {
                    self.unit_of_work
                        .commit()
                        .await
                        .map_err(CommandError::unexpected)?;
                    Ok(output)
                }
                Err(err) => {
                    if let Err(rollback_err) = self.unit_of_work.rollback().await {
                        tracing::error!(error = %rollback_err, "rollback failed after command error");
                    }
                    Err(err)
                }
            }
        })
    }
}

impl std::fmt::Debug for TransactionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStage").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pipeline;
    use folio_core::{CommandHandler, DomainError, TransactionError};
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};

    #[derive(Debug)]
    struct Move;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Moved;

    impl Command for Move {
        type Output = Moved;

        fn name(&self) -> &'static str {
            "Move"
        }
    }

    struct RecordingUow {
        calls: Mutex<Vec<&'static str>>,
        fail_begin: bool,
    }

    impl RecordingUow {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_begin: false,
            })
        }

        fn failing_begin() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_begin: true,
            })
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    impl UnitOfWork for RecordingUow {
        fn begin(&self) -> BoxFuture<'_, Result<(), TransactionError>> {
            Box::pin(async {
                self.calls.lock().push("begin");
                if self.fail_begin {
                    Err(TransactionError("connection refused".to_string()))
                } else {
                    Ok(())
                }
            })
        }

        fn commit(&self) -> BoxFuture<'_, Result<(), TransactionError>> {
            Box::pin(async {
                self.calls.lock().push("commit");
                Ok(())
            })
        }

        fn rollback(&self) -> BoxFuture<'_, Result<(), TransactionError>> {
            Box::pin(async {
                self.calls.lock().push("rollback");
                Ok(())
            })
        }
    }

    struct MoveHandler {
        fail: bool,
    }

    impl CommandHandler<Move> for MoveHandler {
        async fn handle(&self, _ctx: &ExecutionContext, _command: Move) -> Result<Moved, DomainError> {
            if self.fail {
                Err(DomainError::new("move.blocked", "path obstructed"))
            } else {
                Ok(Moved)
            }
        }
    }

    #[tokio::test]
    async fn test_success_commits_exactly_once() {
        let uow = RecordingUow::new();
        let pipeline = Pipeline::new().pipe(TransactionStage::new(uow.clone()));
        let mut ctx = ExecutionContext::new();

        pipeline
            .execute(&mut ctx, Move, &MoveHandler { fail: false })
            .await
            .unwrap();

        assert_eq!(uow.calls(), vec!["begin", "commit"]);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_propagates() {
        let uow = RecordingUow::new();
        let pipeline = Pipeline::new().pipe(TransactionStage::new(uow.clone()));
        let mut ctx = ExecutionContext::new();

        let err = pipeline
            .execute(&mut ctx, Move, &MoveHandler { fail: true })
            .await
            .unwrap_err();

        assert_eq!(uow.calls(), vec!["begin", "rollback"]);
        assert!(err.to_string().contains("move.blocked"));
    }

    #[tokio::test]
    async fn test_begin_failure_skips_handler() {
        let uow = RecordingUow::failing_begin();
        let pipeline = Pipeline::new().pipe(TransactionStage::new(uow.clone()));
        let mut ctx = ExecutionContext::new();

        let err = pipeline
            .execute(&mut ctx, Move, &MoveHandler { fail: false })
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Unexpected(_)));
        assert_eq!(uow.calls(), vec!["begin"]);
    }
}

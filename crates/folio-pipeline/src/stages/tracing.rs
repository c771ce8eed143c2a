//! Span-per-command tracing stage.

use crate::middleware::{Middleware, Next};
use folio_core::{BoxFuture, Command, CommandResult, ExecutionContext};
use metrics::counter;
use tracing::Instrument;

/// Wraps the rest of the chain in a `tracing` span named after the
/// command.
///
/// The span carries the command name and the request id; an error from
/// downstream is recorded as an event inside the span before it
/// propagates. The span closes exactly once, when the wrapped future
/// completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStage;

impl TracingStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<C: Command> Middleware<C> for TracingStage {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        command: C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, CommandResult<C::Output>> {
        let command_name = command.name();
        let span = tracing::info_span!(
            "command",
            command.name = command_name,
            request_id = %ctx.request_id(),
        );

        Box::pin(
            async move {
                counter!("folio_commands_total", "command" => command_name).increment(1);

                let result = next.run(ctx, command).await;
                match &result {
                    Ok(_) => {
                        tracing::debug!(elapsed_ms = ctx.elapsed().as_millis() as u64, "command completed");
                    }
                    Err(err) => {
                        counter!("folio_command_failures_total", "command" => command_name)
                            .increment(1);
                        tracing::error!(error = %err, "command failed");
                    }
                }
                result
            }
            .instrument(span),
        )
    }
}

//! At-most-once execution stage.
//!
//! Guards idempotency-capable commands behind the
//! [`IdempotencyService`]: a repeated request with the same
//! `Idempotency-Key` replays the stored response instead of re-invoking
//! the handler, and two concurrent requests for the same key never both
//! execute.

use crate::middleware::{Middleware, Next};
use folio_core::{BoxFuture, Command, CommandResult, ExecutionContext, GuardError};
use folio_guard::IdempotencyService;
use metrics::counter;
use std::sync::Arc;

/// Whether a guarded execution was served from the stored record.
///
/// Written into the [`ExecutionContext`] extensions on every guarded
/// execution; the transport layer renders it as the
/// `X-Idempotency-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The stored response was replayed; the handler did not run.
    Hit,
    /// The handler ran and its response was recorded.
    Miss,
}

impl CacheOutcome {
    /// The header value for this outcome.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// The HTTP status the original execution recorded, set alongside
/// [`CacheOutcome::Hit`] so a replay answers with the status the first
/// execution answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayedStatus(pub u16);

/// The idempotency guard as a pipeline stage.
///
/// Commands that do not opt in via
/// [`Command::supports_idempotency`], and executions without an
/// idempotency key in the context, bypass the guard entirely.
///
/// For guarded executions:
///
/// 1. failing to take the lock raises [`GuardError::KeyInProgress`];
/// 2. a `Finished` record is replayed without calling `next`;
/// 3. otherwise the execution is marked `Started`, `next` runs, and the
///    response is recorded;
/// 4. the lock is released on every exit path.
pub struct IdempotencyStage {
    service: Arc<IdempotencyService>,
    success_status: u16,
}

impl IdempotencyStage {
    /// Creates the stage over a guard service.
    #[must_use]
    pub fn new(service: Arc<IdempotencyService>) -> Self {
        Self {
            service,
            success_status: 200,
        }
    }

    /// Sets the HTTP status recorded alongside successful responses.
    #[must_use]
    pub const fn with_success_status(mut self, status: u16) -> Self {
        self.success_status = status;
        self
    }

    /// The lock is held here; the caller releases it.
    async fn guarded<C: Command>(
        &self,
        ctx: &mut ExecutionContext,
        key: &str,
        command: C,
        next: Next<'_, C>,
    ) -> CommandResult<C::Output> {
        if let Some(record) = self.service.get_record(key).await? {
            if record.is_finished() {
                let Some((status, body)) = record.stored_response() else {
                    return Err(GuardError::storage_unavailable(format!(
                        "finished record for key '{key}' has no stored body"
                    ))
                    .into());
                };
                let output = serde_json::from_str(body).map_err(|e| {
                    GuardError::storage_unavailable(format!(
                        "stored response for key '{key}' is not decodable: {e}"
                    ))
                })?;
                ctx.set_extension(CacheOutcome::Hit);
                ctx.set_extension(ReplayedStatus(status));
                counter!("folio_idempotency_replays_total").increment(1);
                tracing::debug!(idempotency_key = key, "replayed stored response");
                return Ok(output);
            }
        }

        ctx.set_extension(CacheOutcome::Miss);
        self.service.mark_started(key).await?;
        let output = next.run(ctx, command).await?;

        match serde_json::to_string(&output) {
            Ok(body) => {
                self.service
                    .save_response(key, self.success_status, body)
                    .await?;
            }
            Err(e) => {
                // The handler already ran; surface the result and leave
                // the record at Started rather than fail the request.
                tracing::error!(idempotency_key = key, error = %e, "response not recordable");
            }
        }
        Ok(output)
    }
}

impl<C: Command> Middleware<C> for IdempotencyStage {
    fn name(&self) -> &'static str {
        "idempotency"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        command: C,
        next: Next<'a, C>,
    ) -> BoxFuture<'a, CommandResult<C::Output>> {
        Box::pin(async move {
            if !command.supports_idempotency() {
                return next.run(ctx, command).await;
            }
            let Some(key) = ctx.idempotency_key().map(str::to_owned) else {
                return next.run(ctx, command).await;
            };

            let Some(token) = self.service.acquire_lock(&key).await? else {
                counter!("folio_idempotency_conflicts_total").increment(1);
                return Err(GuardError::key_in_progress(key).into());
            };

            let outcome = self.guarded(ctx, &key, command, next).await;
            self.service.release_lock(&key, &token).await;
            outcome
        })
    }
}

impl std::fmt::Debug for IdempotencyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyStage")
            .field("success_status", &self.success_status)
            .finish_non_exhaustive()
    }
}

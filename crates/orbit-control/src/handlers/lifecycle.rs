//! Start, stop and check: the handlers that keep resource state current.

use async_trait::async_trait;
use orbit_platform::perform;
use orbit_types::{HandlerOutput, ResourceState};
use serde_json::Value;
use tracing::{debug, info};

use super::{dry_run_plan, into_output};
use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::handler::Handler;

/// Starts the service and records what it occupies
#[derive(Debug, Clone, Copy, Default)]
pub struct StartHandler;

#[async_trait]
impl Handler for StartHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<HandlerOutput, HandlerError> {
        if let Some(plan) = dry_run_plan(ctx) {
            return Ok(plan);
        }

        let prior = ctx.prior_state().await;
        let prior_start = prior.as_ref().map(|state| state.start_time);
        let outcome = perform(
            ctx.platform.as_ref(),
            ctx.command,
            &ctx.service,
            &ctx.platform_context(prior),
        )
        .await?;

        if outcome.success {
            let mut state = ResourceState::new(
                ctx.service.name(),
                ctx.platform.kind(),
                ctx.environment(),
            );
            // Re-recording a resource that was already up keeps its start time
            let already_running = outcome.data.get("already_running") == Some(&Value::Bool(true));
            if let (true, Some(started)) = (already_running, prior_start) {
                state.start_time = started;
            }
            state.resources = outcome.resources.clone();
            state.endpoint = outcome.endpoint.clone();
            state.metadata = outcome.metadata.clone();
            ctx.store.save(&state).await?;
            info!(
                service = %ctx.service.name(),
                platform = %ctx.platform.kind(),
                resources = ?state.resources,
                "recorded resource state"
            );
        }

        Ok(into_output(outcome))
    }
}

/// Stops the service and forgets its state
#[derive(Debug, Clone, Copy, Default)]
pub struct StopHandler;

#[async_trait]
impl Handler for StopHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<HandlerOutput, HandlerError> {
        if let Some(plan) = dry_run_plan(ctx) {
            return Ok(plan);
        }

        let prior = ctx.prior_state().await;
        let outcome = perform(
            ctx.platform.as_ref(),
            ctx.command,
            &ctx.service,
            &ctx.platform_context(prior),
        )
        .await?;

        if outcome.success {
            ctx.store
                .clear(ctx.environment(), ctx.service.name())
                .await?;
            debug!(service = %ctx.service.name(), "cleared resource state");
        }

        Ok(into_output(outcome))
    }
}

/// Health check; drops state for resources the platform reports gone
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckHandler;

#[async_trait]
impl Handler for CheckHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<HandlerOutput, HandlerError> {
        let prior = ctx.prior_state().await;
        let had_state = prior.is_some();
        let outcome = perform(
            ctx.platform.as_ref(),
            ctx.command,
            &ctx.service,
            &ctx.platform_context(prior),
        )
        .await?;

        let gone = outcome.data.get("running") == Some(&Value::Bool(false));
        if gone && had_state && !ctx.dry_run() {
            ctx.store
                .clear(ctx.environment(), ctx.service.name())
                .await?;
            info!(service = %ctx.service.name(), "resource gone; cleared stale state");
        }

        Ok(into_output(outcome))
    }
}

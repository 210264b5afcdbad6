//! Handlers for commands that do not touch resource state.

use async_trait::async_trait;
use orbit_platform::perform;
use orbit_types::HandlerOutput;

use super::{dry_run_plan, into_output};
use crate::context::ExecutionContext;
use crate::error::HandlerError;
use crate::handler::Handler;

/// Forwards the command to the matching platform operation with prior state
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardHandler;

#[async_trait]
impl Handler for ForwardHandler {
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
        Ok(into_output(outcome))
    }
}

/// `exec` into a service whose running task must be discovered first
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveredExecHandler;

#[async_trait]
impl Handler for DiscoveredExecHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<HandlerOutput, HandlerError> {
        if let Some(plan) = dry_run_plan(ctx) {
            return Ok(plan);
        }

        let Some(task) = ctx.discovery.get("task_arn").and_then(|v| v.as_str()) else {
            return Ok(HandlerOutput::failed(format!(
                "no running task discovered for {}",
                ctx.service.name()
            )));
        };
        let task = task.to_string();

        let outcome = perform(
            ctx.platform.as_ref(),
            ctx.command,
            &ctx.service,
            &ctx.platform_context(None),
        )
        .await?;
        Ok(into_output(outcome).with_metadata("task_arn", task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::fixtures::mock_context;
    use orbit_platform::{MockBehavior, MockPlatform};
    use orbit_state::{InMemoryStateStore, ResourceStateStore};
    use orbit_types::{CommandKind, PlatformKind, ResourceState};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_backup_forwards_with_prior_state() {
        let platform = Arc::new(MockPlatform::new());
        let store = Arc::new(InMemoryStateStore::new());
        store
            .save(&ResourceState::new("database", PlatformKind::Mock, "local"))
            .await
            .unwrap();
        let ctx = mock_context(CommandKind::Backup, "database", platform.clone(), store);

        let output = ForwardHandler.handle(&ctx).await.unwrap();
        assert!(output.success);
        assert!(output.data["backup_id"].as_str().unwrap().starts_with("mock-database-"));
        assert!(platform.calls()[0].had_prior_state);
    }

    #[tokio::test]
    async fn test_logs_run_during_dry_run() {
        let platform = Arc::new(MockPlatform::new());
        let mut ctx = mock_context(
            CommandKind::Logs,
            "backend",
            platform.clone(),
            Arc::new(InMemoryStateStore::new()),
        );
        ctx.invocation.dry_run = true;

        let output = ForwardHandler.handle(&ctx).await.unwrap();
        assert_eq!(output.data["source"], "mock");
        assert_eq!(platform.calls_for(CommandKind::Logs), vec!["backend"]);
    }

    #[tokio::test]
    async fn test_discovered_exec_needs_task() {
        let platform = Arc::new(MockPlatform::new());
        let mut ctx = mock_context(
            CommandKind::Exec,
            "backend",
            platform.clone(),
            Arc::new(InMemoryStateStore::new()),
        );

        let output = DiscoveredExecHandler.handle(&ctx).await.unwrap();
        assert!(!output.success);
        assert!(platform.calls().is_empty());

        ctx.discovery.insert("task_arn".into(), json!("arn:task/1"));
        let output = DiscoveredExecHandler.handle(&ctx).await.unwrap();
        assert!(output.success);
        assert_eq!(output.metadata["task_arn"], "arn:task/1");
        assert_eq!(platform.calls()[0].discovery["task_arn"], "arn:task/1");
    }

    #[tokio::test]
    async fn test_unsupported_is_a_failure_not_a_fault() {
        let platform = Arc::new(MockPlatform::new());
        platform.script_all(CommandKind::Publish, MockBehavior::Unsupported);
        let ctx = mock_context(
            CommandKind::Publish,
            "frontend",
            platform,
            Arc::new(InMemoryStateStore::new()),
        );

        let output = ForwardHandler.handle(&ctx).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.error.as_deref(), Some("publish is not supported on mock"));
    }
}

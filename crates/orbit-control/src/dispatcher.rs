//! Command dispatcher
//!
//! Applies one [`CommandDescriptor`] to an ordered list of targets and
//! produces one [`CommandResults`] envelope.
//!
//! Targets run one at a time, in order. Every per-service problem (unknown
//! platform, unbuildable service, missing handler, handler fault or panic)
//! is folded into a failed [`CommandResult`]; only option validation and
//! pre-execution hook errors escape as [`DispatchError`].

use chrono::Utc;
use futures::FutureExt;
use orbit_platform::{PlatformContext, PlatformRegistry};
use orbit_service::ServiceFactory;
use orbit_state::ResourceStateStore;
use orbit_types::{
    CommandKind, CommandResult, CommandResults, ConfigMap, ErrorKind, InvocationConfig,
    ServiceKind, ServiceTarget,
};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::builder::CommandDispatcherBuilder;
use crate::commands::{descriptor_for, CommandDescriptor};
use crate::context::{CommandOptions, ExecutionContext};
use crate::error::{error_chain, DispatchError, HandlerError, Result};
use crate::registry::HandlerRegistry;

/// The core orchestrator
pub struct CommandDispatcher {
    platforms: PlatformRegistry,
    handlers: HandlerRegistry,
    factory: ServiceFactory,
    store: Arc<dyn ResourceStateStore>,
}

impl CommandDispatcher {
    pub fn new(
        platforms: PlatformRegistry,
        handlers: HandlerRegistry,
        factory: ServiceFactory,
        store: Arc<dyn ResourceStateStore>,
    ) -> Self {
        Self {
            platforms,
            handlers,
            factory,
            store,
        }
    }

    /// Create a builder
    pub fn builder() -> CommandDispatcherBuilder {
        CommandDispatcherBuilder::new()
    }

    pub fn platforms(&self) -> &PlatformRegistry {
        &self.platforms
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn factory(&self) -> &ServiceFactory {
        &self.factory
    }

    pub fn store(&self) -> &Arc<dyn ResourceStateStore> {
        &self.store
    }

    /// Run a command with its built-in descriptor
    pub async fn run(
        &self,
        command: CommandKind,
        targets: Vec<ServiceTarget>,
        options: &CommandOptions,
        invocation: &InvocationConfig,
    ) -> Result<CommandResults> {
        self.execute(&descriptor_for(command), targets, options, invocation)
            .await
    }

    /// Execute `descriptor` against `targets`.
    #[instrument(
        skip_all,
        fields(
            command = %descriptor.command,
            environment = %invocation.environment,
            invocation_id = %Uuid::new_v4(),
        )
    )]
    pub async fn execute(
        &self,
        descriptor: &CommandDescriptor,
        targets: Vec<ServiceTarget>,
        options: &CommandOptions,
        invocation: &InvocationConfig,
    ) -> Result<CommandResults> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let command = descriptor.command;

        let options = descriptor.merge_options(options);
        if let Some(validate) = &descriptor.validate {
            validate(&options).map_err(|reason| DispatchError::Validation { command, reason })?;
        }

        let targets = match &descriptor.pre_execute {
            Some(hook) => hook(targets, &options)
                .map_err(|reason| DispatchError::PreExecute { command, reason })?,
            None => targets,
        };

        let continue_on_error = descriptor.effective_continue_on_error(&options);
        info!(
            targets = targets.len(),
            continue_on_error,
            dry_run = invocation.dry_run,
            "dispatching"
        );

        let mut results = Vec::with_capacity(targets.len());
        for target in &targets {
            let result = self
                .execute_target(descriptor, target, &options, invocation)
                .await;
            let failed = !result.success;
            results.push(result);

            if failed && !continue_on_error {
                info!(
                    service = %target.name,
                    skipped = targets.len() - results.len(),
                    "stopping after failure"
                );
                break;
            }
        }

        let aggregate = descriptor
            .post_execute
            .as_ref()
            .and_then(|hook| hook(&results));

        let envelope = CommandResults::new(
            command,
            invocation.environment.clone(),
            timestamp,
            elapsed_ms(started),
            results,
            invocation.execution_info(),
        )
        .with_aggregate(aggregate);

        info!(
            total = envelope.summary.total,
            succeeded = envelope.summary.succeeded,
            failed = envelope.summary.failed,
            duration_ms = envelope.duration_ms,
            "command finished"
        );
        Ok(envelope)
    }

    #[instrument(skip_all, fields(service = %target.name, platform = %target.platform))]
    async fn execute_target(
        &self,
        descriptor: &CommandDescriptor,
        target: &ServiceTarget,
        options: &CommandOptions,
        invocation: &InvocationConfig,
    ) -> CommandResult {
        let started = Instant::now();
        let result = self
            .invoke(descriptor, target, options, invocation)
            .await;

        if result.success {
            debug!("service succeeded");
        } else {
            warn!(
                error = result.error.as_deref().unwrap_or_default(),
                error_kind = ?result.error_kind,
                "service failed"
            );
        }
        result.with_duration(elapsed_ms(started))
    }

    async fn invoke(
        &self,
        descriptor: &CommandDescriptor,
        target: &ServiceTarget,
        options: &CommandOptions,
        invocation: &InvocationConfig,
    ) -> CommandResult {
        let command = descriptor.command;

        let Some(platform) = self.platforms.get(target.platform) else {
            return CommandResult::failure(
                &target.name,
                target.platform,
                None,
                ErrorKind::PlatformNotRegistered,
                format!("Platform {} is not registered", target.platform),
            );
        };

        let command_config = descriptor
            .config_builder
            .as_ref()
            .map(|build| build(target, options))
            .unwrap_or_default();
        let service = match self.factory.build(target, &command_config, invocation) {
            Ok(service) => service,
            Err(e) => return fault_result(target, None, &HandlerError::from(e)),
        };

        let service_kind = platform.classify(&service);
        let Some(entry) = self.handlers.lookup(command, target.platform, service_kind) else {
            return CommandResult::handler_not_found(
                command,
                &target.name,
                target.platform,
                service_kind,
            );
        };

        let discovery = if entry.requires_discovery {
            let ctx = PlatformContext::new(invocation.environment.clone())
                .with_options(options.as_map().clone());
            match platform.discover(&service, &ctx).await {
                Ok(discovery) => discovery,
                Err(e) => return fault_result(target, Some(service_kind), &HandlerError::from(e)),
            }
        } else {
            ConfigMap::new()
        };

        let handler = entry.handler.clone();
        let ctx = ExecutionContext {
            command,
            service,
            service_kind,
            platform,
            options: options.clone(),
            discovery,
            invocation: invocation.clone(),
            store: self.store.clone(),
        };

        match AssertUnwindSafe(handler.handle(&ctx)).catch_unwind().await {
            Ok(Ok(output)) => {
                let payload = (descriptor.result_builder)(command, &output);
                CommandResult::from_output(
                    command,
                    &target.name,
                    target.platform,
                    service_kind,
                    output,
                    payload,
                )
            }
            Ok(Err(e)) => fault_result(target, Some(service_kind), &e),
            Err(panic) => CommandResult::failure(
                &target.name,
                target.platform,
                Some(service_kind),
                ErrorKind::ExecutionFailure,
                format!("handler panicked: {}", panic_message(panic.as_ref())),
            )
            .with_metadata("panic", "true"),
        }
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("platforms", &self.platforms)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

fn fault_result(
    target: &ServiceTarget,
    service_kind: Option<ServiceKind>,
    error: &HandlerError,
) -> CommandResult {
    let result = CommandResult::failure(
        &target.name,
        target.platform,
        service_kind,
        ErrorKind::ExecutionFailure,
        error.to_string(),
    );
    match error_chain(error) {
        Some(chain) => result.with_metadata("error_chain", chain),
        None => result,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, HandlerDescriptor, KindSelector};
    use orbit_platform::{MockBehavior, MockPlatform};
    use orbit_state::InMemoryStateStore;
    use orbit_types::{CommandPayload, HandlerOutput, PlatformKind};
    use serde_json::json;

    fn dispatcher(platform: Arc<MockPlatform>) -> CommandDispatcher {
        CommandDispatcher::builder()
            .with_platforms(PlatformRegistry::new().with(platform))
            .with_store(Arc::new(InMemoryStateStore::new()))
            .build()
            .unwrap()
    }

    fn mock(name: &str) -> ServiceTarget {
        ServiceTarget::new(name, PlatformKind::Mock)
    }

    fn invocation() -> InvocationConfig {
        InvocationConfig::new("/srv/app", "local").with_user("ops")
    }

    #[tokio::test]
    async fn test_unregistered_platform_is_per_service() {
        let dispatcher = dispatcher(Arc::new(MockPlatform::new()));
        let results = dispatcher
            .run(
                CommandKind::Check,
                vec![ServiceTarget::new("backend", PlatformKind::Container), mock("frontend")],
                &CommandOptions::new(),
                &invocation(),
            )
            .await
            .unwrap();

        assert_eq!(results.summary.total, 2);
        let backend = results.result_for("backend").unwrap();
        assert_eq!(backend.error_kind, Some(ErrorKind::PlatformNotRegistered));
        assert_eq!(backend.error.as_deref(), Some("Platform container is not registered"));
        assert!(results.result_for("frontend").unwrap().success);
    }

    #[tokio::test]
    async fn test_validation_fails_before_any_service() {
        let platform = Arc::new(MockPlatform::new());
        let dispatcher = dispatcher(platform.clone());
        let err = dispatcher
            .run(CommandKind::Exec, vec![mock("backend")], &CommandOptions::new(), &invocation())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Validation { command: CommandKind::Exec, .. }));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pre_execute_error_is_fatal() {
        let dispatcher = dispatcher(Arc::new(MockPlatform::new()));
        let group = mock("stack").with_config("members", json!([{"platform": "mock"}]));
        let err = dispatcher
            .run(CommandKind::Start, vec![group], &CommandOptions::new(), &invocation())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::PreExecute { .. }));
    }

    #[tokio::test]
    async fn test_fault_carries_error_kind() {
        let platform = Arc::new(MockPlatform::new());
        platform.script_all(CommandKind::Update, MockBehavior::Fault("registry unreachable".into()));
        let results = dispatcher(platform)
            .run(CommandKind::Update, vec![mock("backend")], &CommandOptions::new(), &invocation())
            .await
            .unwrap();

        let result = &results.results[0];
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("registry unreachable"));
        assert_eq!(result.error_kind, Some(ErrorKind::ExecutionFailure));
        assert_eq!(result.metadata["error_kind"], "execution_failure");
    }

    #[tokio::test]
    async fn test_invalid_service_config_is_a_fault() {
        let dispatcher = dispatcher(Arc::new(MockPlatform::new()));
        let target = mock("backend").with_config("preset", "mainframe");
        let results = dispatcher
            .run(CommandKind::Start, vec![target], &CommandOptions::new(), &invocation())
            .await
            .unwrap();
        assert_eq!(results.results[0].error_kind, Some(ErrorKind::ExecutionFailure));
        assert_eq!(results.summary.failed, 1);
    }

    #[tokio::test]
    async fn test_discovery_runs_only_when_required() {
        let platform = Arc::new(MockPlatform::new());
        let mut discovery = ConfigMap::new();
        discovery.insert("task_arn".into(), json!("arn:task/7"));
        platform.set_discovery(discovery);

        let mut handlers = HandlerRegistry::with_builtins();
        handlers.register(
            HandlerDescriptor::new(
                CommandKind::Logs,
                PlatformKind::Mock,
                KindSelector::Exact(ServiceKind::Database),
                handler_fn(|ctx| {
                    Box::pin(async move {
                        Ok(HandlerOutput::ok(json!({
                            "lines": [ctx.discovery["task_arn"].clone()],
                        })))
                    })
                }),
            )
            .with_discovery(),
        );
        let dispatcher = CommandDispatcher::builder()
            .with_platforms(PlatformRegistry::new().with(platform.clone()))
            .with_handlers(handlers)
            .with_store(Arc::new(InMemoryStateStore::new()))
            .build()
            .unwrap();

        let results = dispatcher
            .run(
                CommandKind::Logs,
                vec![mock("database"), mock("backend")],
                &CommandOptions::new(),
                &invocation(),
            )
            .await
            .unwrap();

        assert_eq!(platform.discoveries(), vec!["database"]);
        match &results.results[0].payload {
            CommandPayload::Logs(logs) => assert_eq!(logs.lines, vec!["arn:task/7"]),
            other => panic!("unexpected payload {:?}", other),
        }
        assert_eq!(platform.calls_for(CommandKind::Logs), vec!["backend"]);
    }

    #[tokio::test]
    async fn test_options_reach_platform() {
        let platform = Arc::new(MockPlatform::new());
        dispatcher(platform.clone())
            .run(
                CommandKind::Logs,
                vec![mock("backend")],
                &CommandOptions::new().with("tail", 5),
                &invocation(),
            )
            .await
            .unwrap();
        assert_eq!(platform.calls()[0].options["tail"], json!(5));
    }

    #[tokio::test]
    async fn test_envelope_execution_context() {
        let results = dispatcher(Arc::new(MockPlatform::new()))
            .run(
                CommandKind::Check,
                vec![mock("backend")],
                &CommandOptions::new(),
                &invocation().with_dry_run(true),
            )
            .await
            .unwrap();
        assert_eq!(results.command, CommandKind::Check);
        assert_eq!(results.environment, "local");
        assert_eq!(results.execution_context.user, "ops");
        assert!(results.execution_context.dry_run);
    }
}

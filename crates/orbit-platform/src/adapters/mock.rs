//! In-memory platform for tests and dry demonstrations.
//!
//! Every operation succeeds with plausible data unless scripted otherwise.
//! All calls are recorded.

use async_trait::async_trait;
use orbit_service::Service;
use orbit_types::{CommandKind, ConfigMap, PlatformKind, PlatformResources, ServiceKind};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{PlatformError, Result};
use crate::platform::{OperationOutcome, Platform, PlatformContext};

/// Scripted response for one (operation, service)
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Succeed with this data instead of the default
    Succeed(Value),
    /// Return a failed outcome
    Fail(String),
    /// Return `Err`, as a faulting adapter would
    Fault(String),
    /// Panic inside the operation
    Panic(String),
    /// Report the operation as unsupported
    Unsupported,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: CommandKind,
    pub service: String,
    pub options: ConfigMap,
    pub had_prior_state: bool,
    pub discovery: ConfigMap,
}

/// Mock platform
#[derive(Debug, Default)]
pub struct MockPlatform {
    /// `None` service key applies to every service
    scripts: Mutex<HashMap<(CommandKind, Option<String>), MockBehavior>>,
    kinds: Mutex<HashMap<String, ServiceKind>>,
    discovery: Mutex<ConfigMap>,
    calls: Mutex<Vec<MockCall>>,
    discoveries: Mutex<Vec<String>>,
    counter: AtomicU64,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `operation` for one service
    pub fn script(&self, operation: CommandKind, service: &str, behavior: MockBehavior) -> &Self {
        self.scripts
            .lock()
            .insert((operation, Some(service.to_string())), behavior);
        self
    }

    /// Script `operation` for every service without its own script
    pub fn script_all(&self, operation: CommandKind, behavior: MockBehavior) -> &Self {
        self.scripts.lock().insert((operation, None), behavior);
        self
    }

    /// Classify `service` as `kind`
    pub fn set_kind(&self, service: &str, kind: ServiceKind) -> &Self {
        self.kinds.lock().insert(service.to_string(), kind);
        self
    }

    /// Context returned by [`Platform::discover`]
    pub fn set_discovery(&self, discovery: ConfigMap) -> &Self {
        *self.discovery.lock() = discovery;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Services the operation was called for, in order
    pub fn calls_for(&self, operation: CommandKind) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.service.clone())
            .collect()
    }

    /// Services discovery ran for, in order
    pub fn discoveries(&self) -> Vec<String> {
        self.discoveries.lock().clone()
    }

    fn behavior(&self, operation: CommandKind, service: &str) -> Option<MockBehavior> {
        let scripts = self.scripts.lock();
        scripts
            .get(&(operation, Some(service.to_string())))
            .or_else(|| scripts.get(&(operation, None)))
            .cloned()
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn respond(
        &self,
        operation: CommandKind,
        service: &Service,
        ctx: &PlatformContext,
    ) -> Result<OperationOutcome> {
        self.calls.lock().push(MockCall {
            operation,
            service: service.name().to_string(),
            options: ctx.options.clone(),
            had_prior_state: ctx.prior_state.is_some(),
            discovery: ctx.discovery.clone(),
        });

        match self.behavior(operation, service.name()) {
            Some(MockBehavior::Succeed(data)) => return Ok(OperationOutcome::ok(data)),
            Some(MockBehavior::Fail(message)) => return Ok(OperationOutcome::failed(message)),
            Some(MockBehavior::Fault(message)) => return Err(PlatformError::Injected(message)),
            Some(MockBehavior::Panic(message)) => panic!("{}", message),
            Some(MockBehavior::Unsupported) => return Ok(self.unsupported(operation)),
            None => {}
        }

        let name = service.name();
        let was_running = ctx.prior_state.is_some();
        let outcome = match operation {
            CommandKind::Start => {
                let id = format!("{}-{}", name, self.next_id());
                OperationOutcome::ok(json!({"id": id}))
                    .with_resources(PlatformResources::Mock { id })
                    .with_endpoint(format!("mock://{}", name))
            }
            CommandKind::Stop => {
                OperationOutcome::ok(json!({"stopped": true, "was_running": was_running}))
            }
            CommandKind::Check => OperationOutcome::ok(json!({
                "running": was_running,
                "healthy": was_running,
                "status": if was_running { "running" } else { "stopped" },
            })),
            CommandKind::Backup => OperationOutcome::ok(json!({
                "backup_id": format!("mock-{}-{}", name, self.next_id()),
                "location": "memory",
            })),
            CommandKind::Restore => OperationOutcome::ok(json!({
                "backup_id": ctx.option_str("backup").unwrap_or("latest"),
                "source": "memory",
            })),
            CommandKind::Exec => OperationOutcome::ok(json!({
                "exit_code": 0,
                "stdout": "",
                "stderr": "",
            })),
            CommandKind::Test => OperationOutcome::ok(json!({"exit_code": 0, "output": ""})),
            CommandKind::Logs => OperationOutcome::ok(json!({"lines": [], "source": "mock"})),
            CommandKind::Update | CommandKind::Provision | CommandKind::Publish => {
                OperationOutcome::ok(json!({}))
            }
        };
        Ok(outcome)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Mock
    }

    fn classify(&self, service: &Service) -> ServiceKind {
        self.kinds
            .lock()
            .get(service.name())
            .copied()
            .unwrap_or_else(|| service.declared_kind())
    }

    async fn discover(&self, service: &Service, _ctx: &PlatformContext) -> Result<ConfigMap> {
        self.discoveries.lock().push(service.name().to_string());
        Ok(self.discovery.lock().clone())
    }

    async fn start(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Start, service, ctx)
    }

    async fn stop(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Stop, service, ctx)
    }

    async fn check(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Check, service, ctx)
    }

    async fn update(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Update, service, ctx)
    }

    async fn provision(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Provision, service, ctx)
    }

    async fn publish(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Publish, service, ctx)
    }

    async fn backup(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Backup, service, ctx)
    }

    async fn restore(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Restore, service, ctx)
    }

    async fn exec(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Exec, service, ctx)
    }

    async fn test(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Test, service, ctx)
    }

    async fn logs(&self, service: &Service, ctx: &PlatformContext) -> Result<OperationOutcome> {
        self.respond(CommandKind::Logs, service, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_service::ServiceFactory;
    use orbit_types::{InvocationConfig, ServiceTarget};

    fn service(name: &str) -> Service {
        ServiceFactory::standard()
            .build(
                &ServiceTarget::new(name, PlatformKind::Mock),
                &ConfigMap::new(),
                &InvocationConfig::default(),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_default_start_returns_resources() {
        let platform = MockPlatform::new();
        let outcome = platform
            .start(&service("backend"), &PlatformContext::new("local"))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.resources,
            Some(PlatformResources::Mock {
                id: "backend-1".into()
            })
        );
        assert_eq!(platform.calls_for(CommandKind::Start), vec!["backend"]);
    }

    #[tokio::test]
    async fn test_scripts_prefer_service_over_wildcard() {
        let platform = MockPlatform::new();
        platform
            .script_all(CommandKind::Stop, MockBehavior::Fail("down".into()))
            .script(CommandKind::Stop, "database", MockBehavior::Fault("disk gone".into()));

        let ctx = PlatformContext::new("local");
        let backend = platform.stop(&service("backend"), &ctx).await.unwrap();
        assert_eq!(backend.error.as_deref(), Some("down"));

        let err = platform.stop(&service("database"), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "disk gone");
    }

    #[tokio::test]
    async fn test_classification_override() {
        let platform = MockPlatform::new();
        assert_eq!(platform.classify(&service("database")), ServiceKind::Database);
        platform.set_kind("database", ServiceKind::GraphDatabase);
        assert_eq!(platform.classify(&service("database")), ServiceKind::GraphDatabase);
    }
}

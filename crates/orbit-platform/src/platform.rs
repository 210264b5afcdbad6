//! The uniform operation surface every platform exposes.

use async_trait::async_trait;
use orbit_service::Service;
use orbit_types::{CommandKind, ConfigMap, PlatformKind, PlatformResources, ResourceState, ServiceKind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::Result;

/// Per-call context handed to platform operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformContext {
    /// Environment name
    pub environment: String,

    /// Caller options merged over command defaults
    pub options: ConfigMap,

    /// State recorded by an earlier start, if any
    pub prior_state: Option<ResourceState>,

    /// Extra context resolved by [`Platform::discover`]
    pub discovery: ConfigMap,
}

impl PlatformContext {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: ConfigMap) -> Self {
        self.options = options;
        self
    }

    pub fn with_prior_state(mut self, state: Option<ResourceState>) -> Self {
        self.prior_state = state;
        self
    }

    pub fn with_discovery(mut self, discovery: ConfigMap) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    pub fn option_u64(&self, key: &str) -> Option<u64> {
        match self.options.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `timeout_secs` option as a duration
    pub fn timeout(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.option_u64("timeout_secs").unwrap_or(default_secs))
    }

    pub fn discovered_str(&self, key: &str) -> Option<&str> {
        self.discovery.get(key).and_then(Value::as_str)
    }

    /// Resources recorded by an earlier start
    pub fn prior_resources(&self) -> Option<&PlatformResources> {
        self.prior_state.as_ref().and_then(|s| s.resources.as_ref())
    }
}

/// Structured result of a platform operation
///
/// `success == false` always carries an error message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationOutcome {
    pub success: bool,
    pub error: Option<String>,

    /// Command-specific fields
    pub data: Value,

    /// Resources now occupied (start-class operations)
    pub resources: Option<PlatformResources>,

    pub endpoint: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub warnings: Vec<String>,
}

impl OperationOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "operation failed".to_string();
        }
        Self {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }

    /// The platform has no implementation for `operation`
    pub fn unsupported(operation: CommandKind, platform: PlatformKind) -> Self {
        Self::failed(format!("{} is not supported on {}", operation, platform))
            .with_metadata("unsupported", "true")
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_resources(mut self, resources: PlatformResources) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn is_unsupported(&self) -> bool {
        self.metadata.get("unsupported").is_some_and(|v| v == "true")
    }
}

/// An execution substrate services run on.
///
/// Every operation has a default that reports it as unsupported; adapters
/// override the ones they implement. Unsupported or unsuccessful operations
/// return a failed [`OperationOutcome`]; `Err` is reserved for faults.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Which platform this is.
    fn kind(&self) -> PlatformKind;

    /// Classify a service into the kind used for handler lookup.
    fn classify(&self, service: &Service) -> ServiceKind {
        service.declared_kind()
    }

    /// Resolve extra context for handlers that require discovery.
    async fn discover(&self, _service: &Service, _ctx: &PlatformContext) -> Result<ConfigMap> {
        Ok(ConfigMap::new())
    }

    async fn start(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Start))
    }

    async fn stop(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Stop))
    }

    /// Health and liveness.
    async fn check(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Check))
    }

    async fn update(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Update))
    }

    async fn provision(
        &self,
        _service: &Service,
        _ctx: &PlatformContext,
    ) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Provision))
    }

    async fn publish(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Publish))
    }

    async fn backup(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Backup))
    }

    async fn restore(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Restore))
    }

    /// Run an arbitrary command inside the service.
    async fn exec(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Exec))
    }

    async fn test(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Test))
    }

    /// Collect recent log lines.
    async fn logs(&self, _service: &Service, _ctx: &PlatformContext) -> Result<OperationOutcome> {
        Ok(self.unsupported(CommandKind::Logs))
    }

    /// Outcome for an operation this platform does not implement.
    fn unsupported(&self, operation: CommandKind) -> OperationOutcome {
        OperationOutcome::unsupported(operation, self.kind())
    }
}

/// Invoke the platform operation matching `command`.
pub async fn perform(
    platform: &dyn Platform,
    command: CommandKind,
    service: &Service,
    ctx: &PlatformContext,
) -> Result<OperationOutcome> {
    match command {
        CommandKind::Start => platform.start(service, ctx).await,
        CommandKind::Stop => platform.stop(service, ctx).await,
        CommandKind::Check => platform.check(service, ctx).await,
        CommandKind::Update => platform.update(service, ctx).await,
        CommandKind::Provision => platform.provision(service, ctx).await,
        CommandKind::Publish => platform.publish(service, ctx).await,
        CommandKind::Backup => platform.backup(service, ctx).await,
        CommandKind::Restore => platform.restore(service, ctx).await,
        CommandKind::Exec => platform.exec(service, ctx).await,
        CommandKind::Test => platform.test(service, ctx).await,
        CommandKind::Logs => platform.logs(service, ctx).await,
    }
}

/// Last `n` lines of `text`
pub(crate) fn tail_lines(text: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines[skip..].iter().map(|l| l.to_string()).collect()
}

/// Split a shell-style command option into program + args.
///
/// Arrays are taken verbatim; strings run through `sh -c`.
pub(crate) fn command_argv(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            Some(vec!["sh".to_string(), "-c".to_string(), s.clone()])
        }
        Value::Array(items) => {
            let argv: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            (!argv.is_empty()).then_some(argv)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Bare;

    #[async_trait]
    impl Platform for Bare {
        fn kind(&self) -> PlatformKind {
            PlatformKind::External
        }
    }

    #[tokio::test]
    async fn test_defaults_are_unsupported_not_errors() {
        let service = orbit_service::ServiceFactory::standard()
            .build(
                &orbit_types::ServiceTarget::new("backend", PlatformKind::External),
                &ConfigMap::new(),
                &orbit_types::InvocationConfig::default(),
            )
            .unwrap();
        let ctx = PlatformContext::new("local");

        for command in CommandKind::ALL {
            let outcome = perform(&Bare, command, &service, &ctx).await.unwrap();
            assert!(!outcome.success);
            assert!(outcome.is_unsupported());
            assert_eq!(
                outcome.error.as_deref(),
                Some(format!("{} is not supported on external", command).as_str())
            );
        }
    }

    #[test]
    fn test_context_options() {
        let mut options = ConfigMap::new();
        options.insert("timeout_secs".into(), json!("3"));
        options.insert("tail".into(), json!(20));
        let ctx = PlatformContext::new("local").with_options(options);

        assert_eq!(ctx.timeout(10), Duration::from_secs(3));
        assert_eq!(ctx.option_u64("tail"), Some(20));
        assert!(ctx.prior_resources().is_none());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(tail_lines("a\nb\nc\n", 2), vec!["b", "c"]);
        assert_eq!(tail_lines("a", 5), vec!["a"]);
        assert_eq!(
            command_argv(&json!("echo hi")),
            Some(vec!["sh".into(), "-c".into(), "echo hi".into()])
        );
        assert_eq!(command_argv(&json!(["ls", "-l"])), Some(vec!["ls".into(), "-l".into()]));
        assert_eq!(command_argv(&json!("  ")), None);
        assert_eq!(command_argv(&json!([])), None);
    }
}

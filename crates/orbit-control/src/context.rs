//! Execution context handed to handlers
//!
//! Bundles everything a handler needs for one (command, service) pair: the
//! built service, the platform handle, caller options, discovery results and
//! the state store. Nothing here is read from ambient process state.

use orbit_platform::{Platform, PlatformContext};
use orbit_service::Service;
use orbit_state::ResourceStateStore;
use orbit_types::{merge_config, CommandKind, ConfigMap, InvocationConfig, ResourceState, ServiceKind};
use serde_json::Value;
use std::sync::Arc;

/// Caller options merged over a command's defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOptions(ConfigMap);

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: ConfigMap) -> Self {
        Self(map)
    }

    /// Set an option
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Boolean option; accepts JSON booleans and `"true"`/`"false"` strings
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Options layered over `defaults`; entries from `self` win
    pub fn over(&self, defaults: &ConfigMap) -> Self {
        Self(merge_config(defaults, &self.0))
    }

    pub fn as_map(&self) -> &ConfigMap {
        &self.0
    }

    pub fn into_map(self) -> ConfigMap {
        self.0
    }
}

impl From<ConfigMap> for CommandOptions {
    fn from(map: ConfigMap) -> Self {
        Self(map)
    }
}

/// Context for one handler invocation
#[derive(Clone)]
pub struct ExecutionContext {
    pub command: CommandKind,
    pub service: Service,
    /// Kind the platform classified the service as
    pub service_kind: ServiceKind,
    pub platform: Arc<dyn Platform>,
    pub options: CommandOptions,
    /// Extra context resolved by the platform before invocation
    pub discovery: ConfigMap,
    pub invocation: InvocationConfig,
    pub store: Arc<dyn ResourceStateStore>,
}

impl ExecutionContext {
    pub fn environment(&self) -> &str {
        &self.invocation.environment
    }

    pub fn dry_run(&self) -> bool {
        self.invocation.dry_run
    }

    /// State recorded for this service by an earlier start
    pub async fn prior_state(&self) -> Option<ResourceState> {
        self.store
            .load(self.environment(), self.service.name())
            .await
    }

    /// Context for the platform operation
    pub fn platform_context(&self, prior_state: Option<ResourceState>) -> PlatformContext {
        PlatformContext::new(self.environment())
            .with_options(self.options.as_map().clone())
            .with_prior_state(prior_state)
            .with_discovery(self.discovery.clone())
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("command", &self.command)
            .field("service", &self.service.name())
            .field("service_kind", &self.service_kind)
            .field("platform", &self.platform.kind())
            .field("options", &self.options)
            .field("discovery", &self.discovery)
            .field("environment", &self.invocation.environment)
            .finish()
    }
}

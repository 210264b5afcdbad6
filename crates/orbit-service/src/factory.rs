//! Service factory
//!
//! Requirement layers, merged in order:
//!
//! 1. preset defaults
//! 2. catalog profile (port, health port, environment)
//! 3. `requirements` object in the target config
//! 4. `requirements` object in the command-computed config

use orbit_types::{
    merge_config, ConfigMap, InvocationConfig, ServiceKind, ServiceRequirements, ServiceTarget,
};
use serde_json::Value;
use tracing::trace;

use crate::catalog::ServiceCatalog;
use crate::error::{Result, ServiceError};
use crate::preset::ServicePreset;
use crate::service::Service;

/// Builds [`Service`] values from targets
#[derive(Debug, Clone, Default)]
pub struct ServiceFactory {
    catalog: ServiceCatalog,
}

impl ServiceFactory {
    pub fn new(catalog: ServiceCatalog) -> Self {
        Self { catalog }
    }

    /// Factory over [`ServiceCatalog::standard`]
    pub fn standard() -> Self {
        Self::new(ServiceCatalog::standard())
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Build the service for `target`, overlaying `command_config`.
    pub fn build(
        &self,
        target: &ServiceTarget,
        command_config: &ConfigMap,
        invocation: &InvocationConfig,
    ) -> Result<Service> {
        let config = merge_config(&target.config, command_config);
        let profile = self.catalog.profile_for(&target.name);

        let preset = match config.get("preset").and_then(Value::as_str) {
            Some(name) => name.parse::<ServicePreset>().map_err(|e| ServiceError::InvalidConfig {
                service: target.name.clone(),
                reason: e.to_string(),
            })?,
            None => profile.preset,
        };

        let declared_kind = match config.get("kind").and_then(Value::as_str) {
            Some(name) => name.parse::<ServiceKind>().map_err(|e| ServiceError::InvalidConfig {
                service: target.name.clone(),
                reason: e.to_string(),
            })?,
            None => preset.default_kind(),
        };

        let target_layer = requirements_layer(&target.name, &target.config)?;
        let command_layer = requirements_layer(&target.name, command_config)?;

        let requirements = preset
            .requirements()
            .merge(&profile.requirements())
            .merge(&target_layer)
            .merge(&command_layer);

        trace!(service = %target.name, %preset, kind = %declared_kind, "built service");

        Ok(Service {
            name: target.name.clone(),
            platform: target.platform,
            environment: invocation.environment.clone(),
            project_root: invocation.project_root.clone(),
            declared_kind,
            preset,
            profile,
            config,
            requirements,
        })
    }
}

fn requirements_layer(service: &str, config: &ConfigMap) -> Result<ServiceRequirements> {
    match config.get("requirements") {
        None | Some(Value::Null) => Ok(ServiceRequirements::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|source| {
            ServiceError::InvalidRequirements {
                service: service.to_string(),
                source,
            }
        }),
    }
}

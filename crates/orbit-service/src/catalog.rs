//! Catalog of well-known services
//!
//! Maps a logical service name to its preset and the business-specific
//! defaults (port, health path, environment) platform adapters need.

use orbit_types::{NetworkRequirements, ServiceRequirements};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::preset::ServicePreset;

/// Defaults for one logical service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceProfile {
    pub preset: ServicePreset,
    pub default_port: Option<u16>,
    /// Separate health port when it differs from the service port
    pub health_port: Option<u16>,
    pub health_path: Option<String>,
    pub environment: BTreeMap<String, String>,
    /// Log files relative to the project root
    pub log_files: Vec<String>,
}

impl ServiceProfile {
    pub fn new(preset: ServicePreset) -> Self {
        Self {
            preset,
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }

    pub fn with_health(mut self, port: Option<u16>, path: impl Into<String>) -> Self {
        self.health_port = port;
        self.health_path = Some(path.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_log_file(mut self, path: impl Into<String>) -> Self {
        self.log_files.push(path.into());
        self
    }

    /// Requirement layer contributed by this profile
    pub fn requirements(&self) -> ServiceRequirements {
        ServiceRequirements {
            network: NetworkRequirements {
                ports: self.default_port.into_iter().collect(),
                health_check_port: self.health_port.or(self.default_port),
                protocol: None,
            },
            environment: self.environment.clone(),
            ..Default::default()
        }
    }
}

/// Name-to-profile lookup
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    profiles: BTreeMap<String, ServiceProfile>,
}

impl ServiceCatalog {
    /// Empty catalog; every service falls back to the stateless preset
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the services a typical stack ships with
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            "frontend",
            ServiceProfile::new(ServicePreset::Stateless)
                .with_port(3000)
                .with_health(None, "/")
                .with_env("NODE_ENV", "production")
                .with_log_file("logs/frontend.log"),
        );
        catalog.register(
            "backend",
            ServiceProfile::new(ServicePreset::Stateless)
                .with_port(8080)
                .with_health(None, "/health")
                .with_log_file("logs/backend.log"),
        );
        catalog.register(
            "database",
            ServiceProfile::new(ServicePreset::StatefulDatabase)
                .with_port(5432)
                .with_env("POSTGRES_DB", "app")
                .with_env("POSTGRES_USER", "app"),
        );
        catalog.register(
            "graph",
            ServiceProfile::new(ServicePreset::GraphDatabase)
                .with_port(7687)
                .with_health(Some(7474), "/")
                .with_env("NEO4J_PLUGINS", "[\"apoc\"]"),
        );
        catalog.register("filesystem", ServiceProfile::new(ServicePreset::Filesystem));
        catalog.register(
            "worker",
            ServiceProfile::new(ServicePreset::Worker).with_log_file("logs/worker.log"),
        );
        catalog.register(
            "mcp",
            ServiceProfile::new(ServicePreset::Stateless)
                .with_port(8765)
                .with_health(None, "/health")
                .with_log_file("logs/mcp.log"),
        );
        catalog
    }

    /// Register or replace a profile
    pub fn register(&mut self, name: impl Into<String>, profile: ServiceProfile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&ServiceProfile> {
        self.profiles.get(name)
    }

    /// Profile for `name`, or a stateless default
    pub fn profile_for(&self, name: &str) -> ServiceProfile {
        self.get(name).cloned().unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog() {
        let catalog = ServiceCatalog::standard();
        assert_eq!(
            catalog.get("database").map(|p| p.preset),
            Some(ServicePreset::StatefulDatabase)
        );
        assert_eq!(catalog.names().count(), 7);
    }

    #[test]
    fn test_unknown_service_is_stateless() {
        let profile = ServiceCatalog::standard().profile_for("billing");
        assert_eq!(profile.preset, ServicePreset::Stateless);
        assert!(profile.default_port.is_none());
    }

    #[test]
    fn test_profile_requirements_layer() {
        let graph = ServiceCatalog::standard().profile_for("graph");
        let reqs = graph.requirements();
        assert_eq!(reqs.network.ports, vec![7687]);
        assert_eq!(reqs.network.health_check_port, Some(7474));
        assert!(reqs.environment.contains_key("NEO4J_PLUGINS"));
    }
}

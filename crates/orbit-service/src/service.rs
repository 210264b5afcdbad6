//! The Service value handed to platform adapters

use orbit_types::{ConfigMap, PlatformKind, ServiceKind, ServiceRequirements};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::ServiceProfile;
use crate::preset::ServicePreset;

/// One service, fully resolved for a single invocation.
///
/// Built by [`ServiceFactory`](crate::ServiceFactory) and immutable
/// afterward. Platform adapters stay generic by asking the service for its
/// port, environment, health URL and log sources instead of hard-coding
/// per-service knowledge.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub(crate) name: String,
    pub(crate) platform: PlatformKind,
    pub(crate) environment: String,
    pub(crate) project_root: PathBuf,
    pub(crate) declared_kind: ServiceKind,
    pub(crate) preset: ServicePreset,
    pub(crate) profile: ServiceProfile,
    pub(crate) config: ConfigMap,
    pub(crate) requirements: ServiceRequirements,
}

impl Service {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform
    }

    /// Environment this service was built for
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn preset(&self) -> ServicePreset {
        self.preset
    }

    /// Kind from the `kind` config key, else the preset's default.
    ///
    /// Platforms may reclassify it.
    pub fn declared_kind(&self) -> ServiceKind {
        self.declared_kind
    }

    /// Merged target and command configuration
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Numeric config entry; numeric strings are accepted
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        match self.config.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn config_bool(&self, key: &str) -> Option<bool> {
        match self.config.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// String list config entry; a single string is a one-element list
    pub fn config_strings(&self, key: &str) -> Vec<String> {
        match self.config.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn requirements(&self) -> &ServiceRequirements {
        &self.requirements
    }

    /// Explicit `port` config, else the first declared network port
    pub fn port(&self) -> Option<u16> {
        self.config_u64("port")
            .and_then(|p| u16::try_from(p).ok())
            .or_else(|| self.requirements.network.ports.first().copied())
    }

    /// Environment for the running service.
    ///
    /// Requirement environment, overlaid with the `env` config object, plus
    /// `PORT` (when known) and `ORBIT_ENV`.
    pub fn environment_variables(&self) -> BTreeMap<String, String> {
        let mut vars = self.requirements.environment.clone();

        if let Some(Value::Object(env)) = self.config.get("env") {
            for (key, value) in env {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                vars.insert(key.clone(), value);
            }
        }

        if let Some(port) = self.port() {
            vars.insert("PORT".to_string(), port.to_string());
        }
        vars.insert("ORBIT_ENV".to_string(), self.environment.clone());
        vars
    }

    /// URL platform adapters probe for health.
    ///
    /// `health_url` config wins; otherwise built from `endpoint` (or
    /// `http://<host>:<health port>`) and the health path.
    pub fn health_url(&self) -> Option<String> {
        if let Some(url) = self.config_str("health_url") {
            return Some(url.to_string());
        }

        let path = self
            .config_str("health_path")
            .map(str::to_string)
            .or_else(|| self.profile.health_path.clone())
            .unwrap_or_else(|| "/".to_string());

        let base = match self.config_str("endpoint") {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                let port = self
                    .config_u64("health_port")
                    .and_then(|p| u16::try_from(p).ok())
                    .or(self.requirements.network.health_check_port)
                    .or_else(|| self.port())?;
                let host = self.config_str("host").unwrap_or("localhost");
                format!("http://{}:{}", host, port)
            }
        };

        if path.starts_with('/') {
            Some(format!("{}{}", base, path))
        } else {
            Some(format!("{}/{}", base, path))
        }
    }

    /// Log files for this service, resolved against the project root
    pub fn log_sources(&self) -> Vec<PathBuf> {
        let mut sources: Vec<PathBuf> = Vec::new();
        let configured = self
            .config_str("log_file")
            .map(str::to_string)
            .into_iter()
            .chain(self.profile.log_files.iter().cloned());
        for path in configured {
            let resolved = self.resolve(&path);
            if !sources.contains(&resolved) {
                sources.push(resolved);
            }
        }
        sources
    }

    /// Working directory: `cwd` config, else the project root
    pub fn working_dir(&self) -> PathBuf {
        match self.config_str("cwd") {
            Some(cwd) => self.resolve(cwd),
            None => self.project_root.clone(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.requirements.annotations.get(key).map(String::as_str)
    }

    /// Capability tag such as `supports-provision=true`
    pub fn supports(&self, capability: &str) -> bool {
        self.requirements.supports(capability)
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.platform)
    }
}

//! CLI configuration
//!
//! `orbit.toml` declares, per environment, which services exist and which
//! platform each runs on:
//!
//! ```toml
//! default_environment = "local"
//!
//! [environments.local.services.backend]
//! platform = "process"
//! command = "cargo run --bin api"
//! log_file = "logs/backend.log"
//!
//! [environments.local.services.database]
//! platform = "container"
//! image = "postgres:16"
//! ```

use orbit_types::{ConfigMap, PlatformKind, ServiceTarget};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult};

/// Project config file name
pub const CONFIG_FILE: &str = "orbit.toml";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrbitConfig {
    /// Environment used when `--env` is not given
    pub default_environment: Option<String>,

    /// State directory, relative to the project root unless absolute
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

/// Services of one environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceEntry>,
}

/// One declared service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub platform: PlatformKind,

    /// Everything else is free-form service config
    #[serde(flatten)]
    pub config: ConfigMap,
}

impl OrbitConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `<project_root>/orbit.toml`,
    /// then the user config directory, are tried; no file at all yields the
    /// defaults.
    pub fn load(explicit: Option<&Path>, project_root: &Path) -> CliResult<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        let candidates = [Some(project_root.join(CONFIG_FILE)), Self::user_config_path()];
        for path in candidates.into_iter().flatten() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> CliResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> CliResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("orbit").join("config.toml"))
    }

    /// Every declared service of `environment`, in name order
    pub fn targets(&self, environment: &str) -> Vec<ServiceTarget> {
        self.environments
            .get(environment)
            .map(|env| {
                env.services
                    .iter()
                    .map(|(name, entry)| entry.target(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Targets for the named services, or for all of them with `all`
    pub fn resolve_targets(
        &self,
        environment: &str,
        names: &[String],
        all: bool,
    ) -> CliResult<Vec<ServiceTarget>> {
        if all {
            return Ok(self.targets(environment));
        }
        if names.is_empty() {
            return Err(CliError::InvalidInput(
                "name at least one service or pass --all".into(),
            ));
        }

        let services = self.environments.get(environment).map(|env| &env.services);
        names
            .iter()
            .map(|name| {
                services
                    .and_then(|services| services.get(name))
                    .map(|entry| entry.target(name))
                    .ok_or_else(|| CliError::UnknownService {
                        service: name.clone(),
                        environment: environment.to_string(),
                    })
            })
            .collect()
    }
}

impl ServiceEntry {
    fn target(&self, name: &str) -> ServiceTarget {
        ServiceTarget {
            name: name.to_string(),
            platform: self.platform,
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
default_environment = "staging"
state_dir = ".orbit/state"

[environments.staging.services.backend]
platform = "cloud"
cluster = "main"
region = "eu-west-1"

[environments.staging.services.database]
platform = "container"
image = "postgres:16"
port = 5432

[environments.staging.services.stack]
platform = "cloud"
members = ["backend", { name = "database", platform = "container" }]
"#;

    #[test]
    fn test_parse_sample() {
        let config = OrbitConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.default_environment.as_deref(), Some("staging"));
        assert_eq!(config.state_dir, Some(PathBuf::from(".orbit/state")));

        let targets = config.targets("staging");
        let names: Vec<_> = targets.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["backend@cloud", "database@container", "stack@cloud"]);
        assert_eq!(targets[1].config["port"], json!(5432));
        assert!(targets[2].is_virtual());
        assert!(!targets[0].config.contains_key("platform"));
    }

    #[test]
    fn test_resolve_named_in_order() {
        let config = OrbitConfig::parse(SAMPLE).unwrap();
        let targets = config
            .resolve_targets("staging", &["database".into(), "backend".into()], false)
            .unwrap();
        assert_eq!(targets[0].name, "database");
        assert_eq!(targets[1].platform, PlatformKind::Cloud);
    }

    #[test]
    fn test_resolve_errors() {
        let config = OrbitConfig::parse(SAMPLE).unwrap();
        assert!(matches!(
            config.resolve_targets("staging", &["cache".into()], false),
            Err(CliError::UnknownService { .. })
        ));
        assert!(matches!(
            config.resolve_targets("production", &["backend".into()], false),
            Err(CliError::UnknownService { .. })
        ));
        assert!(matches!(
            config.resolve_targets("staging", &[], false),
            Err(CliError::InvalidInput(_))
        ));
        assert!(config.resolve_targets("production", &[], true).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_platform_is_rejected() {
        let err = OrbitConfig::parse(
            "[environments.local.services.x]\nplatform = \"mainframe\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Toml(_)));
    }

    #[test]
    fn test_load_prefers_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), SAMPLE).unwrap();
        let config = OrbitConfig::load(None, dir.path()).unwrap();
        assert_eq!(config.default_environment.as_deref(), Some("staging"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = OrbitConfig::load(Some(Path::new("/nonexistent/orbit.toml")), Path::new("."));
        assert!(matches!(err, Err(CliError::Config(_))));
    }
}

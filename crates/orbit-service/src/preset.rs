//! Requirement presets per category of service

use orbit_types::{
    ComputeRequirements, NetworkRequirements, Protocol, SecurityRequirements, ServiceKind,
    ServiceRequirements, StorageVolume,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default requirement bundle a service starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ServicePreset {
    /// Stateless HTTP service
    #[default]
    Stateless,

    /// Relational database with persistent, backed-up storage
    StatefulDatabase,

    /// Graph database speaking bolt
    GraphDatabase,

    /// Static files served from a bucket or CDN
    StaticAssets,

    /// Background worker without network exposure
    Worker,

    /// Shared filesystem
    Filesystem,
}

impl ServicePreset {
    pub const ALL: [ServicePreset; 6] = [
        ServicePreset::Stateless,
        ServicePreset::StatefulDatabase,
        ServicePreset::GraphDatabase,
        ServicePreset::StaticAssets,
        ServicePreset::Worker,
        ServicePreset::Filesystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServicePreset::Stateless => "stateless",
            ServicePreset::StatefulDatabase => "stateful-database",
            ServicePreset::GraphDatabase => "graph-database",
            ServicePreset::StaticAssets => "static-assets",
            ServicePreset::Worker => "worker",
            ServicePreset::Filesystem => "filesystem",
        }
    }

    /// Service kind a service built from this preset declares by default
    pub fn default_kind(&self) -> ServiceKind {
        match self {
            ServicePreset::Stateless | ServicePreset::Worker => ServiceKind::Generic,
            ServicePreset::StatefulDatabase => ServiceKind::Database,
            ServicePreset::GraphDatabase => ServiceKind::GraphDatabase,
            ServicePreset::StaticAssets => ServiceKind::StaticSite,
            ServicePreset::Filesystem => ServiceKind::FileSystem,
        }
    }

    /// Baseline requirements
    pub fn requirements(&self) -> ServiceRequirements {
        match self {
            ServicePreset::Stateless => ServiceRequirements {
                network: NetworkRequirements {
                    protocol: Some(Protocol::Http),
                    ..Default::default()
                },
                compute: compute(512, 0.25, 1),
                ..Default::default()
            },
            ServicePreset::StatefulDatabase => ServiceRequirements {
                storage: vec![StorageVolume {
                    name: "data".into(),
                    persistent: true,
                    size_gb: Some(20),
                    mount_path: "/var/lib/postgresql/data".into(),
                    backup: true,
                }],
                network: NetworkRequirements {
                    protocol: Some(Protocol::Tcp),
                    ..Default::default()
                },
                compute: compute(1024, 0.5, 1),
                security: SecurityRequirements {
                    secrets: vec!["DB_PASSWORD".into()],
                    ..Default::default()
                },
                annotations: annotations(&["backup", "restore", "provision"]),
                ..Default::default()
            },
            ServicePreset::GraphDatabase => ServiceRequirements {
                storage: vec![StorageVolume {
                    name: "graph-data".into(),
                    persistent: true,
                    size_gb: Some(10),
                    mount_path: "/data".into(),
                    backup: true,
                }],
                network: NetworkRequirements {
                    protocol: Some(Protocol::Bolt),
                    ..Default::default()
                },
                compute: compute(2048, 1.0, 1),
                security: SecurityRequirements {
                    secrets: vec!["GRAPH_PASSWORD".into()],
                    ..Default::default()
                },
                annotations: annotations(&["backup", "restore"]),
                ..Default::default()
            },
            ServicePreset::StaticAssets => ServiceRequirements {
                network: NetworkRequirements {
                    protocol: Some(Protocol::Https),
                    ..Default::default()
                },
                compute: ComputeRequirements {
                    memory_mb: Some(128),
                    ..Default::default()
                },
                annotations: annotations(&["publish"]),
                ..Default::default()
            },
            ServicePreset::Worker => ServiceRequirements {
                compute: compute(512, 0.5, 1),
                ..Default::default()
            },
            ServicePreset::Filesystem => ServiceRequirements {
                storage: vec![StorageVolume {
                    name: "files".into(),
                    persistent: true,
                    size_gb: None,
                    mount_path: "/mnt/data".into(),
                    backup: true,
                }],
                annotations: annotations(&["backup"]),
                ..Default::default()
            },
        }
    }
}

impl std::fmt::Display for ServicePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServicePreset {
    type Err = orbit_types::ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServicePreset::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| orbit_types::ParseKindError::new("service preset", s))
    }
}

fn compute(memory_mb: u32, cpu: f64, replicas: u32) -> ComputeRequirements {
    ComputeRequirements {
        memory_mb: Some(memory_mb),
        cpu: Some(cpu),
        replicas: Some(replicas),
    }
}

fn annotations(capabilities: &[&str]) -> BTreeMap<String, String> {
    capabilities
        .iter()
        .map(|c| (format!("supports-{}", c), "true".to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_preset_is_stateful() {
        let reqs = ServicePreset::StatefulDatabase.requirements();
        assert!(reqs.is_stateful());
        assert!(reqs.supports("backup"));
        assert!(reqs.supports("provision"));
        assert_eq!(reqs.backup_volumes().count(), 1);
    }

    #[test]
    fn test_stateless_preset_has_no_storage() {
        let reqs = ServicePreset::Stateless.requirements();
        assert!(!reqs.is_stateful());
        assert!(!reqs.supports("backup"));
    }

    #[test]
    fn test_preset_names_parse() {
        for preset in ServicePreset::ALL {
            assert_eq!(preset.as_str().parse::<ServicePreset>().unwrap(), preset);
        }
        assert!("huge".parse::<ServicePreset>().is_err());
    }
}

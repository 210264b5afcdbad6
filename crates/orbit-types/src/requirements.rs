//! Declarative service requirements
//!
//! Requirements describe what a service needs (storage, network, compute,
//! security, environment) without saying how a platform satisfies it.
//! Platform adapters provision "whatever the requirements say".
//!
//! Requirements are layered: a preset provides defaults and later layers
//! override them with [`ServiceRequirements::merge`]. Scalar fields are
//! `Option`s so that "not set" is distinguishable from an explicit value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a service declares about its runtime needs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRequirements {
    /// Storage volumes
    pub storage: Vec<StorageVolume>,

    /// Network exposure
    pub network: NetworkRequirements,

    /// Compute resources
    pub compute: ComputeRequirements,

    /// Security constraints
    pub security: SecurityRequirements,

    /// Environment variables
    pub environment: BTreeMap<String, String>,

    /// Capability tags such as `supports-provision=true`
    pub annotations: BTreeMap<String, String>,
}

/// A storage volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageVolume {
    /// Volume name
    pub name: String,

    /// Whether data survives restarts
    #[serde(default)]
    pub persistent: bool,

    /// Size in gigabytes
    #[serde(default)]
    pub size_gb: Option<u32>,

    /// Mount path inside the service
    pub mount_path: String,

    /// Whether the volume is included in backups
    #[serde(default)]
    pub backup: bool,
}

/// Network protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
    Bolt,
}

/// Network requirements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkRequirements {
    /// Ports the service listens on
    pub ports: Vec<u16>,

    /// Port used for health checks
    pub health_check_port: Option<u16>,

    /// Primary protocol
    pub protocol: Option<Protocol>,
}

/// Compute requirements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeRequirements {
    /// Memory in megabytes
    pub memory_mb: Option<u32>,

    /// CPU units (1.0 = one core)
    pub cpu: Option<f64>,

    /// Replica count
    pub replicas: Option<u32>,
}

/// Security requirements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityRequirements {
    /// Names of secrets the service needs
    pub secrets: Vec<String>,

    /// User id to run as
    pub run_as_user: Option<u32>,

    /// Group id to run as
    pub run_as_group: Option<u32>,
}

impl ServiceRequirements {
    /// Field-level merge of `overlay` on top of `self`.
    ///
    /// Scalars set in the overlay win; lists are unioned (volumes are keyed
    /// by mount path, the overlay's definition replacing the base one); maps
    /// are unioned with overlay values winning per key.
    pub fn merge(&self, overlay: &ServiceRequirements) -> ServiceRequirements {
        let mut storage = self.storage.clone();
        for volume in &overlay.storage {
            match storage.iter_mut().find(|v| v.mount_path == volume.mount_path) {
                Some(existing) => *existing = volume.clone(),
                None => storage.push(volume.clone()),
            }
        }

        let mut environment = self.environment.clone();
        environment.extend(overlay.environment.clone());

        let mut annotations = self.annotations.clone();
        annotations.extend(overlay.annotations.clone());

        ServiceRequirements {
            storage,
            network: NetworkRequirements {
                ports: union(&self.network.ports, &overlay.network.ports),
                health_check_port: overlay
                    .network
                    .health_check_port
                    .or(self.network.health_check_port),
                protocol: overlay.network.protocol.or(self.network.protocol),
            },
            compute: ComputeRequirements {
                memory_mb: overlay.compute.memory_mb.or(self.compute.memory_mb),
                cpu: overlay.compute.cpu.or(self.compute.cpu),
                replicas: overlay.compute.replicas.or(self.compute.replicas),
            },
            security: SecurityRequirements {
                secrets: union(&self.security.secrets, &overlay.security.secrets),
                run_as_user: overlay.security.run_as_user.or(self.security.run_as_user),
                run_as_group: overlay.security.run_as_group.or(self.security.run_as_group),
            },
            environment,
            annotations,
        }
    }

    /// Volumes that should be included in backups
    pub fn backup_volumes(&self) -> impl Iterator<Item = &StorageVolume> {
        self.storage.iter().filter(|v| v.backup)
    }

    /// Whether any declared volume is persistent
    pub fn is_stateful(&self) -> bool {
        self.storage.iter().any(|v| v.persistent)
    }

    /// Read a capability annotation as a boolean flag
    pub fn supports(&self, capability: &str) -> bool {
        self.annotations
            .get(&format!("supports-{}", capability))
            .is_some_and(|v| v == "true")
    }
}

fn union<T: Clone + PartialEq>(base: &[T], overlay: &[T]) -> Vec<T> {
    let mut out = base.to_vec();
    for item in overlay {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(mount: &str, size: u32) -> StorageVolume {
        StorageVolume {
            name: "data".into(),
            persistent: true,
            size_gb: Some(size),
            mount_path: mount.into(),
            backup: true,
        }
    }

    #[test]
    fn test_scalar_override_wins() {
        let base = ServiceRequirements {
            compute: ComputeRequirements {
                memory_mb: Some(512),
                cpu: Some(0.5),
                replicas: Some(1),
            },
            ..Default::default()
        };
        let overlay = ServiceRequirements {
            compute: ComputeRequirements {
                memory_mb: Some(2048),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = base.merge(&overlay);
        assert_eq!(merged.compute.memory_mb, Some(2048));
        assert_eq!(merged.compute.cpu, Some(0.5));
        assert_eq!(merged.compute.replicas, Some(1));
    }

    #[test]
    fn test_lists_and_maps_are_unioned() {
        let mut base = ServiceRequirements::default();
        base.network.ports = vec![5432];
        base.security.secrets = vec!["DB_PASSWORD".into()];
        base.environment.insert("PGDATA".into(), "/var/lib/pg".into());
        base.environment.insert("TZ".into(), "UTC".into());

        let mut overlay = ServiceRequirements::default();
        overlay.network.ports = vec![5432, 9187];
        overlay.security.secrets = vec!["REPLICATION_KEY".into()];
        overlay.environment.insert("TZ".into(), "Europe/Paris".into());

        let merged = base.merge(&overlay);
        assert_eq!(merged.network.ports, vec![5432, 9187]);
        assert_eq!(merged.security.secrets.len(), 2);
        assert_eq!(merged.environment["PGDATA"], "/var/lib/pg");
        assert_eq!(merged.environment["TZ"], "Europe/Paris");
    }

    #[test]
    fn test_volumes_keyed_by_mount_path() {
        let base = ServiceRequirements {
            storage: vec![volume("/data", 10)],
            ..Default::default()
        };
        let overlay = ServiceRequirements {
            storage: vec![volume("/data", 50), volume("/backups", 5)],
            ..Default::default()
        };

        let merged = base.merge(&overlay);
        assert_eq!(merged.storage.len(), 2);
        assert_eq!(merged.storage[0].size_gb, Some(50));
        assert_eq!(merged.backup_volumes().count(), 2);
        assert!(merged.is_stateful());
    }

    #[test]
    fn test_supports_annotation() {
        let mut reqs = ServiceRequirements::default();
        reqs.annotations
            .insert("supports-provision".into(), "true".into());
        assert!(reqs.supports("provision"));
        assert!(!reqs.supports("publish"));
    }

    #[test]
    fn test_partial_json_deserializes() {
        let reqs: ServiceRequirements =
            serde_json::from_str(r#"{"compute": {"memory_mb": 1024}}"#).unwrap();
        assert_eq!(reqs.compute.memory_mb, Some(1024));
        assert!(reqs.storage.is_empty());
    }
}

//! Service targets - the unit of work handed to the dispatcher

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PlatformKind;

/// Free-form per-service configuration (ports, image references, paths, ...)
pub type ConfigMap = serde_json::Map<String, Value>;

/// One logical service on one platform
///
/// Produced by the discovery step outside the core; the dispatcher only
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTarget {
    /// Logical service name (e.g. `database`, `frontend`)
    pub name: String,

    /// Platform the service runs on
    pub platform: PlatformKind,

    /// Free-form configuration
    #[serde(default)]
    pub config: ConfigMap,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, platform: PlatformKind) -> Self {
        Self {
            name: name.into(),
            platform,
            config: ConfigMap::new(),
        }
    }

    /// Set a configuration entry
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Whether this target is a virtual grouping of other targets
    pub fn is_virtual(&self) -> bool {
        self.config.get("members").is_some_and(Value::is_array)
    }
}

impl std::fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.platform)
    }
}

/// Merge two config maps; entries from `overlay` win.
pub fn merge_config(base: &ConfigMap, overlay: &ConfigMap) -> ConfigMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_virtual_detection() {
        let plain = ServiceTarget::new("backend", PlatformKind::Process);
        assert!(!plain.is_virtual());

        let group = ServiceTarget::new("stack", PlatformKind::Process)
            .with_config("members", json!(["backend", "frontend"]));
        assert!(group.is_virtual());
    }

    #[test]
    fn test_merge_config_overlay_wins() {
        let base = ServiceTarget::new("db", PlatformKind::Container)
            .with_config("image", "postgres:15")
            .with_config("port", 5432)
            .config;
        let overlay = ServiceTarget::new("db", PlatformKind::Container)
            .with_config("image", "postgres:16")
            .config;

        let merged = merge_config(&base, &overlay);
        assert_eq!(merged["image"], json!("postgres:16"));
        assert_eq!(merged["port"], json!(5432));
    }

    #[test]
    fn test_target_display() {
        let target = ServiceTarget::new("frontend", PlatformKind::Cloud);
        assert_eq!(target.to_string(), "frontend@cloud");
    }
}

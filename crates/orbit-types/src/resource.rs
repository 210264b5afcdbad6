//! Persisted record of what a running service occupies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::PlatformKind;

/// Platform-specific resource identifiers
///
/// Tagged by platform so only one variant is populated, serialized as
/// `{"platform": "posix", "data": {"pid": 1234}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", content = "data", rename_all = "lowercase")]
pub enum PlatformResources {
    /// Bare OS process
    Posix {
        pid: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
    },

    /// Container managed by the local runtime
    Container {
        container_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },

    /// Cloud-managed resources
    Aws {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cluster: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_arn: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task_arn: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_arn: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        db_instance: Option<String>,
    },

    /// Externally managed endpoint
    External { endpoint: String },

    /// In-memory test resource
    Mock { id: String },
}

impl PlatformResources {
    /// Process id, for posix resources
    pub fn pid(&self) -> Option<u32> {
        match self {
            PlatformResources::Posix { pid, .. } => Some(*pid),
            _ => None,
        }
    }

    /// Short human-readable identifier
    pub fn display_id(&self) -> String {
        match self {
            PlatformResources::Posix { pid, .. } => format!("pid:{}", pid),
            PlatformResources::Container { container_id, .. } => {
                let short: String = container_id.chars().take(12).collect();
                format!("container:{}", short)
            }
            PlatformResources::Aws {
                service_arn,
                task_arn,
                function_arn,
                db_instance,
                ..
            } => service_arn
                .as_ref()
                .or(task_arn.as_ref())
                .or(function_arn.as_ref())
                .or(db_instance.as_ref())
                .cloned()
                .unwrap_or_else(|| "aws".to_string()),
            PlatformResources::External { endpoint } => endpoint.clone(),
            PlatformResources::Mock { id } => format!("mock:{}", id),
        }
    }
}

/// What is currently running for one (environment, service)
///
/// Written wholesale on every save; there is no partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// Service name
    pub entity: String,

    /// Platform the resources live on
    pub platform: PlatformKind,

    /// Environment name
    pub environment: String,

    /// When the service was started
    pub start_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<PlatformResources>,

    /// Human-readable endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ResourceState {
    pub fn new(
        entity: impl Into<String>,
        platform: PlatformKind,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            platform,
            environment: environment.into(),
            start_time: Utc::now(),
            resources: None,
            endpoint: None,
            metadata: BTreeMap::new(),
        }
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
}

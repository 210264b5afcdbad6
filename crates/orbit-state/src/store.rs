//! Store trait definition.

use async_trait::async_trait;
use orbit_types::ResourceState;
use tracing::{debug, info};

use crate::error::Result;
use crate::liveness::{Liveness, LivenessProbe};

/// Durable record of what is running, keyed by (environment, service).
#[async_trait]
pub trait ResourceStateStore: Send + Sync {
    /// Save state, fully replacing any prior state for the same key.
    ///
    /// The key is taken from `state.environment` and `state.entity`.
    async fn save(&self, state: &ResourceState) -> Result<()>;

    /// Load state. Missing or unreadable entries are `None`.
    async fn load(&self, environment: &str, service: &str) -> Option<ResourceState>;

    /// Remove state. Removing an absent entry succeeds.
    async fn clear(&self, environment: &str, service: &str) -> Result<()>;

    /// All readable states for an environment, ordered by service name.
    async fn list(&self, environment: &str) -> Result<Vec<ResourceState>>;

    /// Remove every state for an environment.
    async fn clear_environment(&self, environment: &str) -> Result<()>;

    /// Environments that currently hold state.
    async fn list_environments(&self) -> Result<Vec<String>>;

    /// Remove entries whose resource is proven dead.
    ///
    /// Returns the names of removed services. Entries the probe reports as
    /// alive or unknown are left untouched.
    async fn cleanup(&self, environment: &str, probe: &dyn LivenessProbe) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for state in self.list(environment).await? {
            match probe.probe(&state) {
                Liveness::Dead => {
                    self.clear(environment, &state.entity).await?;
                    info!(environment, service = %state.entity, "removed stale state");
                    removed.push(state.entity);
                }
                liveness => {
                    debug!(environment, service = %state.entity, ?liveness, "keeping state");
                }
            }
        }
        Ok(removed)
    }

    /// Check if state exists.
    async fn exists(&self, environment: &str, service: &str) -> bool {
        self.load(environment, service).await.is_some()
    }
}

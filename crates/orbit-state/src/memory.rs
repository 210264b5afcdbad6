//! In-memory state store for development and testing.
//!
//! Not durable across processes.

use async_trait::async_trait;
use dashmap::DashMap;
use orbit_types::ResourceState;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{validate_key, Result};
use crate::store::ResourceStateStore;

/// In-memory store implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    /// States indexed by (environment, service).
    states: Arc<DashMap<(String, String), ResourceState>>,
}

impl InMemoryStateStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all environments.
    pub fn total_count(&self) -> usize {
        self.states.len()
    }
}

#[async_trait]
impl ResourceStateStore for InMemoryStateStore {
    async fn save(&self, state: &ResourceState) -> Result<()> {
        validate_key(&state.environment)?;
        validate_key(&state.entity)?;
        self.states.insert(
            (state.environment.clone(), state.entity.clone()),
            state.clone(),
        );
        Ok(())
    }

    async fn load(&self, environment: &str, service: &str) -> Option<ResourceState> {
        self.states
            .get(&(environment.to_string(), service.to_string()))
            .map(|s| s.clone())
    }

    async fn clear(&self, environment: &str, service: &str) -> Result<()> {
        validate_key(environment)?;
        validate_key(service)?;
        self.states
            .remove(&(environment.to_string(), service.to_string()));
        Ok(())
    }

    async fn list(&self, environment: &str) -> Result<Vec<ResourceState>> {
        let mut states: Vec<ResourceState> = self
            .states
            .iter()
            .filter(|entry| entry.key().0 == environment)
            .map(|entry| entry.value().clone())
            .collect();
        states.sort_by(|a, b| a.entity.cmp(&b.entity));
        Ok(states)
    }

    async fn clear_environment(&self, environment: &str) -> Result<()> {
        validate_key(environment)?;
        self.states.retain(|(env, _), _| env != environment);
        Ok(())
    }

    async fn list_environments(&self) -> Result<Vec<String>> {
        let environments: BTreeSet<String> =
            self.states.iter().map(|entry| entry.key().0.clone()).collect();
        Ok(environments.into_iter().collect())
    }
}

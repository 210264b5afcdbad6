//! Platform registry.
//!
//! Constructed once at process start and shared by handle with the
//! dispatcher. Holds exactly one instance per platform kind.

use orbit_types::PlatformKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::{
    CloudPlatform, ContainerPlatform, ExternalPlatform, MockPlatform, ProcessPlatform,
};
use crate::platform::Platform;
use crate::runner::{CommandRunner, TokioCommandRunner};

/// Lookup from platform kind to its implementation
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    platforms: BTreeMap<PlatformKind, Arc<dyn Platform>>,
}

impl PlatformRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter, running subprocesses through `runner`
    pub fn standard(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new()
            .with(Arc::new(ProcessPlatform::new(runner.clone())))
            .with(Arc::new(ContainerPlatform::new(runner.clone())))
            .with(Arc::new(CloudPlatform::new(runner)))
            .with(Arc::new(ExternalPlatform::new()))
            .with(Arc::new(MockPlatform::new()))
    }

    /// [`standard`](Self::standard) with the tokio runner
    pub fn with_defaults() -> Self {
        Self::standard(Arc::new(TokioCommandRunner::new()))
    }

    /// Register a platform, replacing any existing one of the same kind
    pub fn register(&mut self, platform: Arc<dyn Platform>) {
        let kind = platform.kind();
        if self.platforms.insert(kind, platform).is_some() {
            debug!(platform = %kind, "replaced platform");
        }
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, platform: Arc<dyn Platform>) -> Self {
        self.register(platform);
        self
    }

    pub fn get(&self, kind: PlatformKind) -> Option<Arc<dyn Platform>> {
        self.platforms.get(&kind).cloned()
    }

    pub fn contains(&self, kind: PlatformKind) -> bool {
        self.platforms.contains_key(&kind)
    }

    /// Registered kinds, in declaration order
    pub fn kinds(&self) -> Vec<PlatformKind> {
        self.platforms.keys().copied().collect()
    }
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("platforms", &self.kinds())
            .finish()
    }
}

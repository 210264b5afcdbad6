//! Builder for the command dispatcher

use orbit_platform::PlatformRegistry;
use orbit_service::ServiceFactory;
use orbit_state::ResourceStateStore;
use std::sync::Arc;

use crate::dispatcher::CommandDispatcher;
use crate::error::{DispatchError, Result};
use crate::registry::HandlerRegistry;

/// Builder for [`CommandDispatcher`]
///
/// Platforms, handlers and the service factory default to the built-in
/// sets. The state store has no default.
#[derive(Default)]
pub struct CommandDispatcherBuilder {
    platforms: Option<PlatformRegistry>,
    handlers: Option<HandlerRegistry>,
    factory: Option<ServiceFactory>,
    store: Option<Arc<dyn ResourceStateStore>>,
}

impl CommandDispatcherBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the platform registry
    pub fn with_platforms(mut self, platforms: PlatformRegistry) -> Self {
        self.platforms = Some(platforms);
        self
    }

    /// Set the handler registry
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Set the service factory
    pub fn with_factory(mut self, factory: ServiceFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the resource state store
    pub fn with_store(mut self, store: Arc<dyn ResourceStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the dispatcher
    pub fn build(self) -> Result<CommandDispatcher> {
        let store = self
            .store
            .ok_or(DispatchError::Incomplete { component: "store" })?;

        Ok(CommandDispatcher::new(
            self.platforms.unwrap_or_else(PlatformRegistry::with_defaults),
            self.handlers.unwrap_or_else(HandlerRegistry::with_builtins),
            self.factory.unwrap_or_else(ServiceFactory::standard),
            store,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_state::InMemoryStateStore;
    use orbit_types::PlatformKind;

    #[test]
    fn test_store_is_required() {
        let err = CommandDispatcherBuilder::new().build().unwrap_err();
        assert_eq!(err.to_string(), "dispatcher is missing its store");
    }

    #[test]
    fn test_defaults() {
        let dispatcher = CommandDispatcherBuilder::new()
            .with_store(Arc::new(InMemoryStateStore::new()))
            .build()
            .unwrap();
        assert_eq!(dispatcher.platforms().kinds(), PlatformKind::ALL.to_vec());
        assert!(dispatcher.handlers().coverage_gaps().is_empty());
    }
}

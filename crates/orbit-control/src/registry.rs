//! Handler registry
//!
//! Three-key lookup from (command, platform, service kind) to a handler.
//! Populated once before dispatch; read-only afterwards.

use orbit_types::{CommandKind, PlatformKind, ServiceKind};
use std::collections::BTreeMap;
use tracing::debug;

use crate::handler::{HandlerDescriptor, KindSelector};
use crate::handlers::register_builtin_handlers;

type HandlerKey = (CommandKind, PlatformKind, KindSelector);

/// Registry of handlers
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<HandlerKey, HandlerDescriptor>,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_handlers(&mut registry);
        registry
    }

    /// Register a handler, returning the one it replaced
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Option<HandlerDescriptor> {
        let key = (descriptor.command, descriptor.platform, descriptor.kind);
        let replaced = self.handlers.insert(key, descriptor);
        if replaced.is_some() {
            debug!(command = %key.0, platform = %key.1, kind = %key.2, "replaced handler");
        }
        replaced
    }

    /// Most specific handler for the triple.
    ///
    /// An exact kind registration wins over the `Any` fallback. `None` when
    /// neither exists.
    pub fn lookup(
        &self,
        command: CommandKind,
        platform: PlatformKind,
        kind: ServiceKind,
    ) -> Option<&HandlerDescriptor> {
        if let Some(found) = self
            .handlers
            .get(&(command, platform, KindSelector::Exact(kind)))
        {
            debug!(%command, %platform, %kind, "exact handler");
            return Some(found);
        }
        let fallback = self.handlers.get(&(command, platform, KindSelector::Any));
        debug!(%command, %platform, %kind, found = fallback.is_some(), "fallback handler");
        fallback
    }

    /// (command, platform) pairs with no registration for any kind
    pub fn coverage_gaps(&self) -> Vec<(CommandKind, PlatformKind)> {
        let mut gaps = Vec::new();
        for command in CommandKind::ALL {
            for platform in PlatformKind::ALL {
                let covered = self
                    .handlers
                    .keys()
                    .any(|(c, p, _)| *c == command && *p == platform);
                if !covered {
                    gaps.push((command, platform));
                }
            }
        }
        gaps
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.handlers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use orbit_types::HandlerOutput;
    use serde_json::json;

    fn noop(command: CommandKind, platform: PlatformKind, kind: KindSelector) -> HandlerDescriptor {
        let handler = handler_fn(|_ctx| Box::pin(async { Ok(HandlerOutput::ok(json!({}))) }));
        HandlerDescriptor::new(command, platform, kind, handler)
    }

    #[test]
    fn test_exact_wins_over_any() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop(CommandKind::Exec, PlatformKind::Cloud, KindSelector::Any));
        registry.register(
            noop(
                CommandKind::Exec,
                PlatformKind::Cloud,
                KindSelector::Exact(ServiceKind::EcsService),
            )
            .with_discovery(),
        );

        let ecs = registry
            .lookup(CommandKind::Exec, PlatformKind::Cloud, ServiceKind::EcsService)
            .unwrap();
        assert!(ecs.requires_discovery);

        let lambda = registry
            .lookup(CommandKind::Exec, PlatformKind::Cloud, ServiceKind::Lambda)
            .unwrap();
        assert_eq!(lambda.kind, KindSelector::Any);
    }

    #[test]
    fn test_miss_is_none() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop(
            CommandKind::Backup,
            PlatformKind::Container,
            KindSelector::Exact(ServiceKind::Database),
        ));
        assert!(registry
            .lookup(CommandKind::Backup, PlatformKind::Container, ServiceKind::WebApp)
            .is_none());
        assert!(registry
            .lookup(CommandKind::Backup, PlatformKind::Process, ServiceKind::Database)
            .is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = HandlerRegistry::new();
        assert!(registry
            .register(noop(CommandKind::Start, PlatformKind::Mock, KindSelector::Any))
            .is_none());
        assert!(registry
            .register(noop(CommandKind::Start, PlatformKind::Mock, KindSelector::Any))
            .is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_coverage_gaps() {
        let mut registry = HandlerRegistry::new();
        assert_eq!(
            registry.coverage_gaps().len(),
            CommandKind::ALL.len() * PlatformKind::ALL.len()
        );

        registry.register(noop(
            CommandKind::Start,
            PlatformKind::Mock,
            KindSelector::Exact(ServiceKind::Mock),
        ));
        assert!(!registry
            .coverage_gaps()
            .contains(&(CommandKind::Start, PlatformKind::Mock)));
    }

    #[test]
    fn test_builtins_cover_every_pair() {
        let registry = HandlerRegistry::with_builtins();
        assert!(registry.coverage_gaps().is_empty());
        assert_eq!(
            registry.len(),
            CommandKind::ALL.len() * PlatformKind::ALL.len() + 1
        );
    }
}

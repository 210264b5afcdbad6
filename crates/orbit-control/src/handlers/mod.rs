//! Built-in handlers
//!
//! Handlers own state persistence; platforms only report what they did.

mod lifecycle;
mod operations;

pub use lifecycle::{CheckHandler, StartHandler, StopHandler};
pub use operations::{DiscoveredExecHandler, ForwardHandler};

use orbit_platform::OperationOutcome;
use orbit_types::{CommandKind, HandlerOutput, PlatformKind, ServiceKind};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::handler::{Handler, HandlerDescriptor, KindSelector};
use crate::registry::HandlerRegistry;

/// Register every built-in handler.
///
/// Each (command, platform) pair gets an `Any` fallback. `exec` on
/// ECS-backed cloud services additionally needs the running task resolved
/// first.
pub fn register_builtin_handlers(registry: &mut HandlerRegistry) {
    let start: Arc<dyn Handler> = Arc::new(StartHandler);
    let stop: Arc<dyn Handler> = Arc::new(StopHandler);
    let check: Arc<dyn Handler> = Arc::new(CheckHandler);
    let forward: Arc<dyn Handler> = Arc::new(ForwardHandler);

    for platform in PlatformKind::ALL {
        for command in CommandKind::ALL {
            let handler = match command {
                CommandKind::Start => start.clone(),
                CommandKind::Stop => stop.clone(),
                CommandKind::Check => check.clone(),
                _ => forward.clone(),
            };
            registry.register(HandlerDescriptor::new(
                command,
                platform,
                KindSelector::Any,
                handler,
            ));
        }
    }

    registry.register(
        HandlerDescriptor::new(
            CommandKind::Exec,
            PlatformKind::Cloud,
            KindSelector::Exact(ServiceKind::EcsService),
            Arc::new(DiscoveredExecHandler),
        )
        .with_discovery(),
    );
}

/// Output describing what a mutating command would do, or `None` when it
/// should really run.
pub(crate) fn dry_run_plan(ctx: &ExecutionContext) -> Option<HandlerOutput> {
    if !ctx.dry_run() || !ctx.command.is_mutating() {
        return None;
    }
    Some(HandlerOutput::ok(json!({
        "dry_run": true,
        "planned": format!(
            "{} {} on {} ({})",
            ctx.command,
            ctx.service.name(),
            ctx.platform.kind(),
            ctx.environment()
        ),
    })))
}

/// Convert a platform outcome into handler output.
///
/// Endpoint and resources are folded into `data` so typed payloads can pick
/// them up.
pub(crate) fn into_output(outcome: OperationOutcome) -> HandlerOutput {
    let mut data = outcome.data;
    if let Value::Object(map) = &mut data {
        if let Some(endpoint) = &outcome.endpoint {
            map.entry("endpoint").or_insert_with(|| json!(endpoint));
        }
        if let Some(resources) = &outcome.resources {
            if let Ok(value) = serde_json::to_value(resources) {
                map.entry("resources").or_insert(value);
            }
        }
    }

    HandlerOutput {
        success: outcome.success,
        error: outcome.error,
        data,
        metadata: outcome.metadata,
        warnings: outcome.warnings,
    }
}

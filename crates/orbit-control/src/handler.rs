//! Handler trait and registration descriptors

use async_trait::async_trait;
use futures::future::BoxFuture;
use orbit_types::{CommandKind, HandlerOutput, PlatformKind, ServiceKind};
use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::HandlerError;

/// Performs one command for one (platform, service kind) pairing.
///
/// `Ok` with `success == false` is an ordinary failure. `Err` is a fault
/// and is reported as `execution_failure`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<HandlerOutput, HandlerError>;
}

/// Future returned by closures passed to [`handler_fn`]
pub type HandlerFuture<'a> = BoxFuture<'a, Result<HandlerOutput, HandlerError>>;

struct FnHandler<F>(F);

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a ExecutionContext) -> HandlerFuture<'a> + Send + Sync,
{
    async fn handle(&self, ctx: &ExecutionContext) -> Result<HandlerOutput, HandlerError> {
        (self.0)(ctx).await
    }
}

/// Adapt a closure into a [`Handler`]
///
/// ```ignore
/// let handler = handler_fn(|ctx| Box::pin(async move {
///     Ok(HandlerOutput::ok(json!({"service": ctx.service.name()})))
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a ExecutionContext) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

/// Which service kinds a registration covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KindSelector {
    /// Fallback for every kind without an exact registration
    Any,
    Exact(ServiceKind),
}

impl KindSelector {
    pub fn matches(&self, kind: ServiceKind) -> bool {
        match self {
            KindSelector::Any => true,
            KindSelector::Exact(k) => *k == kind,
        }
    }
}

impl fmt::Display for KindSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindSelector::Any => f.write_str("any"),
            KindSelector::Exact(kind) => write!(f, "{}", kind),
        }
    }
}

impl From<ServiceKind> for KindSelector {
    fn from(kind: ServiceKind) -> Self {
        KindSelector::Exact(kind)
    }
}

/// A registered (command, platform, kind) → handler entry
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub command: CommandKind,
    pub platform: PlatformKind,
    pub kind: KindSelector,
    pub handler: Arc<dyn Handler>,
    /// Ask the platform to resolve extra context before invoking the handler
    pub requires_discovery: bool,
}

impl HandlerDescriptor {
    pub fn new(
        command: CommandKind,
        platform: PlatformKind,
        kind: KindSelector,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            command,
            platform,
            kind,
            handler,
            requires_discovery: false,
        }
    }

    pub fn with_discovery(mut self) -> Self {
        self.requires_discovery = true;
        self
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("command", &self.command)
            .field("platform", &self.platform)
            .field("kind", &self.kind)
            .field("requires_discovery", &self.requires_discovery)
            .finish()
    }
}

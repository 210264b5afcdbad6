//! Error types for the control plane

use orbit_platform::PlatformError;
use orbit_service::ServiceError;
use orbit_state::StateError;
use orbit_types::CommandKind;
use thiserror::Error;

/// A fault raised inside a handler.
///
/// Never escapes the dispatcher; it becomes an `execution_failure` result.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Platform operation faulted
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// State store failed
    #[error("state store: {0}")]
    State(#[from] StateError),

    /// Service could not be built
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Anything else
    #[error("{0}")]
    Message(String),
}

impl HandlerError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Errors fatal to a whole invocation.
///
/// Raised before any service has been touched. `Incomplete` comes from the
/// builder, never from dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Options failed the descriptor's validation
    #[error("invalid options for {command}: {reason}")]
    Validation { command: CommandKind, reason: String },

    /// The pre-execution hook rejected the target list
    #[error("cannot prepare targets for {command}: {reason}")]
    PreExecute { command: CommandKind, reason: String },

    /// The dispatcher builder lacks a required component
    #[error("dispatcher is missing its {component}")]
    Incomplete { component: &'static str },
}

/// Result type for dispatch
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Render an error with its `source()` chain joined by `: `.
pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut parts = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(": "))
    }
}

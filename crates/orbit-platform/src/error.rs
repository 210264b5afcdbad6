//! Error types for orbit-platform crate.
//!
//! A `PlatformError` is a fault: the operation could not be carried out
//! at all. Operations that ran and did not succeed, or that a platform does
//! not support, are reported as failed [`OperationOutcome`](crate::OperationOutcome)s
//! instead.

use std::time::Duration;
use thiserror::Error;

/// Faults raised by platform operations.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A subprocess could not be spawned.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A subprocess did not finish in time.
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// Filesystem error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Signal delivery failed.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Output from an external tool could not be interpreted.
    #[error("unexpected output from {tool}: {reason}")]
    UnexpectedOutput { tool: String, reason: String },

    /// Extra context required by the operation could not be resolved.
    #[error("discovery failed for {service}: {reason}")]
    Discovery { service: String, reason: String },

    /// Required configuration is missing or malformed.
    #[error("invalid configuration for {service}: {reason}")]
    InvalidConfig { service: String, reason: String },

    /// Injected fault (test doubles).
    #[error("{0}")]
    Injected(String),
}

impl PlatformError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn unexpected(tool: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

//! Error types for orbit-state crate.

use thiserror::Error;

/// Errors that can occur in state store operations.
///
/// Missing or unparsable state files are not errors; they load as absent.
#[derive(Debug, Error)]
pub enum StateError {
    /// Environment or service name cannot be used as a path component.
    #[error("invalid state key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Filesystem error.
    #[error("state I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Validate that `key` is usable as a single path component.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "empty"
    } else if key == "." || key == ".." {
        "relative path component"
    } else if key.contains('/') || key.contains('\\') {
        "contains a path separator"
    } else if key.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };

    Err(StateError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

//! CLI error types

use orbit_control::DispatchError;
use orbit_state::StateError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service not declared for the environment
    #[error("Unknown service {service:?} in environment {environment:?}")]
    UnknownService {
        /// Service name
        service: String,
        /// Environment name
        environment: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The command was rejected before any service ran
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// State store error
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

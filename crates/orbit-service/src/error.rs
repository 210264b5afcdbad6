//! Error types for orbit-service crate.

use thiserror::Error;

/// Errors building a service from its configuration.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The `requirements` config object does not describe requirements.
    #[error("invalid requirements for {service}: {source}")]
    InvalidRequirements {
        service: String,
        #[source]
        source: serde_json::Error,
    },

    /// A config entry has an unusable value.
    #[error("invalid configuration for {service}: {reason}")]
    InvalidConfig { service: String, reason: String },
}

/// Result type for service construction.
pub type Result<T> = std::result::Result<T, ServiceError>;

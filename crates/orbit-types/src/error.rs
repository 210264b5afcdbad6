//! Error types for orbit-types

use thiserror::Error;

/// A string did not name a known command, platform or service kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {category}: {value}")]
pub struct ParseKindError {
    /// Which enum was being parsed
    pub category: &'static str,
    /// The rejected input
    pub value: String,
}

impl ParseKindError {
    pub fn new(category: &'static str, value: impl Into<String>) -> Self {
        Self {
            category,
            value: value.into(),
        }
    }
}

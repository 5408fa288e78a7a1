//! Error types for quotawatch

use thiserror::Error;

use crate::alerting::NotificationError;

/// Result type alias using quotawatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for quotawatch operations
///
/// The transition evaluator never returns these; they belong to the
/// collaborators around it (sources, stores, sinks, configuration).
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source error
    #[error("Configuration error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Usage fetch failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }
}

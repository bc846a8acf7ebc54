//! Error types shared by deltasync crates

use thiserror::Error;

/// Result type alias for shared helpers
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while reading configuration
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl CommonError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

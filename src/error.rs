//! Error types for bot operations
//!
//! Failures of the external processing call are not errors here: they are
//! values of [`crate::outcome::ProcessingOutcome`]. `BotError` covers the
//! chat transport, configuration and faults inside the bot itself.

use thiserror::Error;

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

/// Error types for bot operations
#[derive(Error, Debug)]
pub enum BotError {
    /// Chat transport failures (send, edit, download)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client construction or usage errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Input/output errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create error for a required environment variable that is absent or blank
    pub fn missing_env(variable: &str, purpose: &str) -> Self {
        Self::InvalidConfig(format!(
            "{} is not set. It must hold the {}.",
            variable, purpose
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create transport error with the failed operation as context
    pub fn transport_operation(operation: &str, error: &dyn std::fmt::Display) -> Self {
        Self::Transport(format!("Failed to {}: {}", operation, error))
    }

    /// Whether this error came from the chat transport
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<teloxide::RequestError> for BotError {
    fn from(error: teloxide::RequestError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<teloxide::DownloadError> for BotError {
    fn from(error: teloxide::DownloadError) -> Self {
        Self::Transport(format!("download failed: {}", error))
    }
}

//! Error types for the generation pipeline.

use thiserror::Error;

/// Primary error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum TernError {
    /// Hard configuration failure (e.g. no model id supplied).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Recoverable "not configured" condition from the credential resolver,
    /// distinct from a hard failure.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TernError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether this error represents a missing-credential/model condition
    /// that is surfaced pre-flight, before any job is registered.
    pub fn is_preflight(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::NotConfigured(_))
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => matches!(status, 429 | 500..=599),
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TernError>;

//! Error Types
//!
//! Error handling for the chat client and conversation loop.

use thiserror::Error;

/// Main error type for chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// The server answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// No response was received (connection refused, DNS, timeout)
    #[error("Network error: unable to reach the API ({0})")]
    Network(String),

    /// Local failure while building or sending a request
    #[error("Request error: {0}")]
    Request(String),

    /// Transport failure while a stream was open
    #[error("Stream error: {0}")]
    Stream(String),

    /// Response body did not have the expected shape
    #[error("Unexpected response format: {0}")]
    Response(String),

    /// Configuration errors (invalid JSON, missing key, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Console or file IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// HTTP status for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ChatError::Network(err.to_string())
        } else if err.is_decode() {
            ChatError::Response(format!("failed to decode response: {}", err))
        } else {
            ChatError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Response(format!("JSON parsing error: {}", err))
    }
}

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

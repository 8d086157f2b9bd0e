//! Error types for provider calls.

use thiserror::Error;

/// Errors that can occur when calling an external provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Connection error - unable to reach the provider.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout.
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Local server (Ollama) is not running.
    #[error("Server is not running at {host}")]
    ServerNotRunning { host: String },

    /// API returned an error response, including quota rejections.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The provider answered without any text.
    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured API key variable is unset.
    #[error("Missing API key: set the {var} environment variable")]
    MissingApiKey { var: String },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether the error came from the provider running out of time.
    pub fn is_timeout(&self) -> bool {
        match self {
            ProviderError::Timeout { .. } => true,
            ProviderError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

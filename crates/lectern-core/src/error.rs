//! Error types for Lectern.

use thiserror::Error;

/// Core error type for domain-level validation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid source reference: {0}")]
    InvalidSource(String),

    #[error("Invalid content unit: {0}")]
    InvalidUnit(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using Lectern's core Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

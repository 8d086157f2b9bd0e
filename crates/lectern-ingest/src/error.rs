//! Error types for the ingestion pipeline.

use crate::pipeline::FileFailure;
use lectern_process::ProcessError;
use lectern_providers::ProviderError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] lectern_db::DbError),

    #[error("Config error: {0}")]
    Config(#[from] lectern_config::ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Parse error for {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("{operation} timed out after {seconds} seconds")]
    Timeout { operation: String, seconds: u64 },

    #[error("Scratch area error: {0}")]
    Scratch(String),

    #[error("Invalid audio plan: {0}")]
    InvalidPlan(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("No file in the batch could be ingested ({} failures)", failures.len())]
    NothingIngested { failures: Vec<FileFailure> },
}

impl IngestError {
    pub(crate) fn parse(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        IngestError::ParseError {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Coarse category reported for a failed file.
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::UnsupportedFileType(_) => FailureKind::Classification,
            IngestError::Provider(e) if e.is_timeout() => FailureKind::Timeout,
            IngestError::Provider(_) => FailureKind::Provider,
            IngestError::Timeout { .. } => FailureKind::Timeout,
            IngestError::Process(ProcessError::Io(_) | ProcessError::ToolNotFound { .. }) => FailureKind::Io,
            IngestError::Process(_)
            | IngestError::ParseError { .. }
            | IngestError::InvalidPlan(_)
            | IngestError::Task(_) => FailureKind::Decode,
            IngestError::Io(_)
            | IngestError::Database(_)
            | IngestError::Config(_)
            | IngestError::Scratch(_)
            | IngestError::NothingIngested { .. } => FailureKind::Io,
        }
    }
}

/// Category of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Classification,
    Provider,
    Decode,
    Io,
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Classification => "classification",
            FailureKind::Provider => "provider",
            FailureKind::Decode => "decode",
            FailureKind::Io => "io",
            FailureKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Error types for media processing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for processing operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors that can occur during media processing.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Tool not found: {tool}. Please install it.")]
    ToolNotFound { tool: String },

    #[error("{tool} failed (exit code {code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("OCR error: {0}")]
    OcrError(String),

    #[error("Unreadable frame rate {fps} for {path}")]
    InvalidFrameRate { path: PathBuf, fps: f64 },

    #[error("No video stream in {0}")]
    NoVideoStream(PathBuf),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<image::ImageError> for ProcessError {
    fn from(err: image::ImageError) -> Self {
        ProcessError::Image(err.to_string())
    }
}

//! OCR processing using Tesseract.

use crate::error::{ProcessError, ProcessResult};
use crate::tool::{require, require_file};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Result of OCR processing.
#[derive(Debug, Clone, Default)]
pub struct OcrResult {
    /// The extracted text, trimmed.
    pub text: String,
}

impl OcrResult {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Perform OCR on an image file.
pub fn ocr_image(image_path: &Path) -> ProcessResult<OcrResult> {
    require_file(image_path)?;
    require("tesseract")?;

    debug!("Running OCR on {:?}", image_path);

    let output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .args(["--psm", "3"]) // Fully automatic page segmentation
        .output()?;

    // Tesseract prints warnings to stderr and may exit non-zero with usable text
    if !output.status.success() && output.stdout.is_empty() {
        return Err(ProcessError::OcrError(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(OcrResult {
        text: String::from_utf8_lossy(&output.stdout).trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image() {
        let result = ocr_image(Path::new("/nonexistent/slide.png"));
        assert!(matches!(result, Err(ProcessError::FileNotFound(_))));
    }

    #[test]
    fn test_empty_result() {
        assert!(OcrResult::default().is_empty());
    }
}

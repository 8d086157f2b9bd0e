//! Lectern Process - Local media tooling for the ingestion pipeline.
//!
//! This crate provides:
//! - Media probing, audio extraction and slicing (via FFmpeg CLI)
//! - Frame sampling from decoded video
//! - OCR for images (via Tesseract CLI)
//! - PDF image extraction and page rendering (via Poppler CLI)
//!
//! These rely on external tools being installed on the system.

mod error;
mod ffmpeg;
mod frames;
mod ocr;
mod pdf;
mod tool;

pub use error::{ProcessError, ProcessResult};
pub use ffmpeg::{export_audio_slice, extract_audio, get_media_info, MediaInfo};
pub use frames::{frame_file_name, sample_frames, FrameSelector, SampledFrame};
pub use ocr::{ocr_image, OcrResult};
pub use pdf::{extract_pdf_images, render_pdf_pages, PdfImage};

/// External tools the pipeline shells out to.
pub const TOOLS: &[&str] = &["ffmpeg", "ffprobe", "tesseract", "pdfimages", "pdftoppm"];

/// Check if required external tools are available.
pub fn check_dependencies() -> Vec<(&'static str, bool)> {
    TOOLS
        .iter()
        .map(|tool| (*tool, which::which(tool).is_ok()))
        .collect()
}

/// Check if all required tools are installed.
pub fn all_tools_available() -> bool {
    check_dependencies().iter().all(|(_, available)| *available)
}

//! Local media tooling used by the sub-pipelines.
//!
//! The pipeline talks to FFmpeg and Poppler through [`MediaToolkit`] so the
//! orchestration can run against a fake in tests.

use crate::error::{IngestError, IngestResult};
use lectern_config::PdfImageMode;
use lectern_process::{PdfImage, SampledFrame};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Blocking media operations. Callers run these on the blocking pool.
pub trait MediaToolkit: Send + Sync {
    /// Duration of a media file in seconds.
    fn duration(&self, path: &Path) -> IngestResult<f64>;

    /// Whether a media file carries an audio stream.
    fn has_audio(&self, path: &Path) -> IngestResult<bool>;

    /// Write `[start, start + duration)` of `source` to `dest`.
    fn export_slice(&self, source: &Path, dest: &Path, start: f64, duration: f64) -> IngestResult<()>;

    /// Extract the audio track of a video into `output_dir`.
    fn extract_audio(&self, video: &Path, output_dir: &Path, format: &str) -> IngestResult<PathBuf>;

    /// Sample frames from a video into `output_dir`.
    fn sample_frames(
        &self,
        video: &Path,
        output_dir: &Path,
        desired_fps: Option<f64>,
    ) -> IngestResult<Vec<SampledFrame>>;

    /// Pull images out of a PDF according to `mode`.
    fn pdf_images(
        &self,
        pdf: &Path,
        output_dir: &Path,
        mode: PdfImageMode,
        dpi: u32,
    ) -> IngestResult<Vec<PdfImage>>;
}

/// [`MediaToolkit`] backed by the FFmpeg and Poppler command line tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegToolkit;

impl MediaToolkit for FfmpegToolkit {
    fn duration(&self, path: &Path) -> IngestResult<f64> {
        Ok(lectern_process::get_media_info(path)?.duration)
    }

    fn has_audio(&self, path: &Path) -> IngestResult<bool> {
        Ok(lectern_process::get_media_info(path)?.has_audio())
    }

    fn export_slice(&self, source: &Path, dest: &Path, start: f64, duration: f64) -> IngestResult<()> {
        Ok(lectern_process::export_audio_slice(source, dest, start, duration)?)
    }

    fn extract_audio(&self, video: &Path, output_dir: &Path, format: &str) -> IngestResult<PathBuf> {
        Ok(lectern_process::extract_audio(video, output_dir, format)?)
    }

    fn sample_frames(
        &self,
        video: &Path,
        output_dir: &Path,
        desired_fps: Option<f64>,
    ) -> IngestResult<Vec<SampledFrame>> {
        Ok(lectern_process::sample_frames(video, output_dir, desired_fps)?)
    }

    fn pdf_images(
        &self,
        pdf: &Path,
        output_dir: &Path,
        mode: PdfImageMode,
        dpi: u32,
    ) -> IngestResult<Vec<PdfImage>> {
        match mode {
            PdfImageMode::Embedded => Ok(lectern_process::extract_pdf_images(pdf, output_dir)?),
            PdfImageMode::Pages => Ok(lectern_process::render_pdf_pages(pdf, output_dir, dpi)?),
            PdfImageMode::Off => Ok(Vec::new()),
        }
    }
}

/// Run blocking work off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> IngestResult<T>
where
    F: FnOnce() -> IngestResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IngestError::Task(e.to_string()))?
}

/// [`run_blocking`] bounded by `limit`. On timeout the task is abandoned and
/// the caller gets [`IngestError::Timeout`].
pub(crate) async fn run_blocking_timeout<T, F>(limit: Duration, operation: &str, f: F) -> IngestResult<T>
where
    F: FnOnce() -> IngestResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, run_blocking(f)).await {
        Ok(result) => result,
        Err(_) => Err(IngestError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

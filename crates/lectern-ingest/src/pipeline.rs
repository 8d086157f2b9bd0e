//! Batch ingestion.
//!
//! A batch is a set of uploaded files plus optional subject/course context.
//! Each file is classified, staged in the batch's scratch directory, and
//! routed through its sub-pipelines (text, PDF images, standalone image,
//! video frames, audio). A file whose sub-pipeline fails is reported and
//! contributes no units; the rest of the batch carries on.

use crate::assembler::{assemble, RawUnit};
use crate::audio::AudioEngine;
use crate::caption::{CaptionScheduler, Clock, SystemClock, TesseractExtractor, TextExtractor};
use crate::error::{FailureKind, IngestError, IngestResult};
use crate::loader::TextCorpusLoader;
use crate::parsers::{self, TextParser};
use crate::scratch::{self, ScratchArea, ScratchFile, WorkDir};
use crate::toolkit::{run_blocking, run_blocking_timeout, FfmpegToolkit, MediaToolkit};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use lectern_config::{Config, PdfImageMode};
use lectern_core::{BatchContext, ContentUnit, IngestPath, MediaFormat, MediaKind, SourceId, SourceRef};
use lectern_process::{PdfImage, SampledFrame};
use lectern_providers::{transcription_from_config, vision_from_config, TranscriptionProvider, VisionProvider};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One file handed to the pipeline.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub source: SourceRef,
    pub bytes: Vec<u8>,
    /// MIME type declared by the uploader, if any.
    pub declared_mime: Option<String>,
}

impl UploadedFile {
    pub fn new(source: SourceRef, bytes: Vec<u8>) -> Self {
        Self {
            source,
            bytes,
            declared_mime: None,
        }
    }

    /// Identify the file from an upload name, see [`SourceRef::resolve`].
    pub fn from_upload(upload_name: &str, bytes: Vec<u8>) -> Self {
        let source = SourceRef::resolve(upload_name, &bytes);
        Self::new(source, bytes)
    }

    /// Read a file from disk, named by its file name.
    pub fn read(path: &Path) -> IngestResult<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| IngestError::UnsupportedFileType(path.display().to_string()))?;
        Ok(Self::from_upload(&name, bytes))
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime = Some(mime.into());
        self
    }
}

/// Where a file is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Received,
    Classified,
    Assembled,
    Done,
    Failed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Received => "received",
            FileState::Classified => "classified",
            FileState::Assembled => "assembled",
            FileState::Done => "done",
            FileState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a file produced no units.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub file_name: String,
    pub source_id: SourceId,
    /// Sub-pipeline that failed, if the file got that far.
    pub path: Option<IngestPath>,
    pub kind: FailureKind,
    pub message: String,
}

/// Per-file summary of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: SourceRef,
    pub kind: MediaKind,
    pub state: FileState,
    pub units: usize,
}

/// Result of one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub units: Vec<ContentUnit>,
    pub files: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchOutcome {
    /// Sources that were fully processed.
    pub fn succeeded(&self) -> impl Iterator<Item = &SourceRef> {
        self.files
            .iter()
            .filter(|f| f.state == FileState::Done)
            .map(|f| &f.source)
    }
}

/// External services the pipeline calls.
#[derive(Clone)]
pub struct Providers {
    pub transcription: Arc<dyn TranscriptionProvider>,
    pub primary_vision: Arc<dyn VisionProvider>,
    pub secondary_vision: Arc<dyn VisionProvider>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl Providers {
    /// Build the configured clients. Fails if an API key is missing.
    pub fn from_config(config: &Config) -> IngestResult<Self> {
        let providers = &config.providers;
        let captioning = &config.captioning;
        let caption_timeout = Duration::from_secs(captioning.caption_timeout_seconds);

        Ok(Self {
            transcription: transcription_from_config(
                &providers.transcription,
                Duration::from_secs(config.audio.transcription_timeout_seconds),
            )?,
            primary_vision: vision_from_config(&providers.primary_vision, &captioning.prompt, caption_timeout)?,
            secondary_vision: vision_from_config(&providers.secondary_vision, &captioning.prompt, caption_timeout)?,
            extractor: Arc::new(TesseractExtractor::new(Duration::from_secs(
                captioning.ocr_timeout_seconds,
            ))),
        })
    }
}

/// State shared by the files of one batch.
struct Batch<'a> {
    work: &'a WorkDir,
    context: &'a BatchContext,
    captions: CaptionScheduler,
    audio: AudioEngine,
}

struct FileOutcome {
    report: FileReport,
    units: Vec<ContentUnit>,
    failures: Vec<FileFailure>,
}

/// The multimodal ingestion pipeline.
pub struct Pipeline {
    config: Config,
    scratch: ScratchArea,
    providers: Providers,
    toolkit: Arc<dyn MediaToolkit>,
    clock: Arc<dyn Clock>,
    loader: TextCorpusLoader,
}

impl Pipeline {
    pub fn new(config: Config, scratch_root: impl Into<PathBuf>, providers: Providers) -> Self {
        let loader = TextCorpusLoader::from_config(&config.text);
        Self {
            config,
            scratch: ScratchArea::new(scratch_root),
            providers,
            toolkit: Arc::new(FfmpegToolkit),
            clock: Arc::new(SystemClock),
            loader,
        }
    }

    pub fn with_toolkit(mut self, toolkit: Arc<dyn MediaToolkit>) -> Self {
        self.toolkit = toolkit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process a batch. Fails only when no file could be ingested or the
    /// scratch area is unusable.
    pub async fn ingest(&self, files: Vec<UploadedFile>, context: &BatchContext) -> IngestResult<BatchOutcome> {
        let batch_id = Uuid::new_v4().simple().to_string();
        let started_at = Utc::now();
        info!("Starting batch {} with {} files", batch_id, files.len());

        let work = self.scratch.acquire(&batch_id)?;
        let batch = Batch {
            work: &work,
            context,
            captions: CaptionScheduler::new(
                self.providers.primary_vision.clone(),
                self.providers.secondary_vision.clone(),
                self.providers.extractor.clone(),
                self.clock.clone(),
                &self.config.captioning,
            ),
            audio: AudioEngine::from_config(
                self.providers.transcription.clone(),
                self.toolkit.clone(),
                &self.config.audio,
            ),
        };

        let outcomes: Vec<FileOutcome> = stream::iter(files)
            .map(|file| self.process_file(file, &batch))
            .buffered(self.config.pipeline.max_concurrent_files.max(1))
            .collect()
            .await;

        drop(batch);
        if let Err(e) = work.release() {
            warn!("Failed to clean up batch {}: {}", batch_id, e);
        }

        let mut units = Vec::new();
        let mut files = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            units.extend(outcome.units);
            files.push(outcome.report);
            failures.extend(outcome.failures);
        }

        let succeeded = files.iter().filter(|f| f.state == FileState::Done).count();
        if succeeded == 0 {
            warn!("Batch {}: no file could be ingested", batch_id);
            return Err(IngestError::NothingIngested { failures });
        }

        info!(
            "Batch {} finished: {} units from {} files, {} failed",
            batch_id,
            units.len(),
            succeeded,
            failures.len()
        );

        Ok(BatchOutcome {
            batch_id,
            units,
            files,
            failures,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn process_file(&self, file: UploadedFile, batch: &Batch<'_>) -> FileOutcome {
        let source = file.source.clone();
        let mut state = FileState::Received;

        let kind = MediaKind::classify(&source.name, file.declared_mime.as_deref());
        advance(&source, &mut state, FileState::Classified);
        debug!("{} classified as {}", source.name, kind);

        if kind == MediaKind::Unsupported {
            let what = file
                .declared_mime
                .clone()
                .unwrap_or_else(|| source.name.clone());
            return failed(source, kind, None, IngestError::UnsupportedFileType(what), &mut state);
        }

        let staged = match self.stage(file, kind, batch.work).await {
            Ok(path) => path,
            Err(e) => return failed(source, kind, None, e, &mut state),
        };

        let paths = self.enabled_paths(kind);
        let results = join_all(paths.iter().map(|&path| {
            let staged = staged.as_path();
            let source = &source;
            async move { (path, self.run_path(path, kind, staged, source, batch).await) }
        }))
        .await;

        let mut raw = Vec::new();
        let mut failures = Vec::new();
        for (path, result) in results {
            match result {
                Ok(units) => raw.extend(units),
                Err(e) => failures.push(failure(&source, Some(path), e)),
            }
        }

        let units = assemble(raw, &source, batch.context);
        if units.is_empty() && !failures.is_empty() {
            advance(&source, &mut state, FileState::Failed);
            return FileOutcome {
                report: FileReport {
                    source,
                    kind,
                    state,
                    units: 0,
                },
                units,
                failures,
            };
        }

        advance(&source, &mut state, FileState::Assembled);
        advance(&source, &mut state, FileState::Done);
        if failures.is_empty() {
            info!("Ingested {} ({}): {} units", source.name, kind, units.len());
        } else {
            warn!(
                "Ingested {} ({}) partially: {} units, {} failed paths",
                source.name,
                kind,
                units.len(),
                failures.len()
            );
        }

        FileOutcome {
            report: FileReport {
                source,
                kind,
                state,
                units: units.len(),
            },
            units,
            failures,
        }
    }

    fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.config.pipeline.tool_timeout_seconds)
    }

    fn enabled_paths(&self, kind: MediaKind) -> Vec<IngestPath> {
        kind.paths()
            .iter()
            .copied()
            .filter(|path| match path {
                IngestPath::PdfImages => self.config.pdf.image_mode != PdfImageMode::Off,
                IngestPath::Audio if kind == MediaKind::Video => self.config.video.transcribe_audio,
                _ => true,
            })
            .collect()
    }

    /// Write the upload into the batch directory for its kind.
    async fn stage(&self, file: UploadedFile, kind: MediaKind, work: &WorkDir) -> IngestResult<PathBuf> {
        let dir = work.subdir(staging_dir(kind))?;
        let path = dir.join(staged_name(&file.source));
        tokio::fs::write(&path, &file.bytes).await?;
        Ok(path)
    }

    async fn run_path(
        &self,
        path: IngestPath,
        kind: MediaKind,
        staged: &Path,
        source: &SourceRef,
        batch: &Batch<'_>,
    ) -> IngestResult<Vec<RawUnit>> {
        debug!("{}: running {} path", source.name, path);
        match path {
            IngestPath::Text => self.text_units(staged).await,
            IngestPath::PdfImages => self.pdf_image_units(staged, batch).await,
            IngestPath::Image => self.image_unit(staged, batch).await,
            IngestPath::VideoFrames => self.frame_units(staged, batch).await,
            IngestPath::Audio => self.transcript_units(kind, staged, batch).await,
        }
    }

    async fn text_units(&self, staged: &Path) -> IngestResult<Vec<RawUnit>> {
        let loader = self.loader.clone();
        let path = staged.to_path_buf();
        let document = run_blocking(move || {
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            match parsers::parser_for(extension) {
                Some(parser) => loader.load_with(&path, parser.as_ref()),
                None => loader.load_with(&path, &TextParser::new()),
            }
        })
        .await?;

        Ok(document
            .chunks
            .into_iter()
            .map(|chunk| RawUnit::Text {
                text: chunk.text,
                page: chunk.page,
                chunk_index: chunk.chunk_index,
            })
            .collect())
    }

    async fn pdf_image_units(&self, staged: &Path, batch: &Batch<'_>) -> IngestResult<Vec<RawUnit>> {
        let out = batch.work.subdir(scratch::EXTRACTED_IMAGES_DIR)?;
        let toolkit = self.toolkit.clone();
        let pdf = staged.to_path_buf();
        let mode = self.config.pdf.image_mode;
        let dpi = self.config.pdf.render_dpi;
        let operation = format!("PDF image extraction of {}", file_name(staged));
        let images = run_blocking_timeout(self.tool_timeout(), &operation, move || {
            toolkit.pdf_images(&pdf, &out, mode, dpi)
        })
        .await?;
        debug!("{:?}: {} images to caption", staged, images.len());

        let captioned = caption_each(&batch.captions, images, image_path).await?;
        Ok(captioned
            .into_iter()
            .map(|(image, text)| RawUnit::Image {
                text,
                image_ref: file_name(&image.path),
                page: Some(image.page),
            })
            .collect())
    }

    async fn image_unit(&self, staged: &Path, batch: &Batch<'_>) -> IngestResult<Vec<RawUnit>> {
        let captioned = caption_each(&batch.captions, vec![staged.to_path_buf()], PathBuf::as_path).await?;
        Ok(captioned
            .into_iter()
            .map(|(path, text)| RawUnit::Image {
                text,
                image_ref: file_name(&path),
                page: None,
            })
            .collect())
    }

    async fn frame_units(&self, staged: &Path, batch: &Batch<'_>) -> IngestResult<Vec<RawUnit>> {
        let out = batch.work.subdir(scratch::VIDEO_FRAMES_DIR)?;
        let toolkit = self.toolkit.clone();
        let video = staged.to_path_buf();
        let fps = self.config.video.sampling_fps();
        let operation = format!("Frame sampling of {}", file_name(staged));
        let frames = run_blocking_timeout(self.tool_timeout(), &operation, move || {
            toolkit.sample_frames(&video, &out, fps)
        })
        .await?;
        debug!("{:?}: {} frames to caption", staged, frames.len());

        let captioned = caption_each(&batch.captions, frames, frame_path).await?;
        Ok(captioned
            .into_iter()
            .map(|(frame, text)| RawUnit::Frame {
                text,
                image_ref: file_name(&frame.path),
                frame: frame.index,
                timestamp: frame.timestamp,
            })
            .collect())
    }

    async fn transcript_units(&self, kind: MediaKind, staged: &Path, batch: &Batch<'_>) -> IngestResult<Vec<RawUnit>> {
        let chunk_dir = batch.work.subdir(scratch::AUDIO_CHUNKS_DIR)?;

        let (text, media_format) = if kind == MediaKind::Video {
            let toolkit = self.toolkit.clone();
            let video = staged.to_path_buf();
            let check = format!("Audio stream check of {}", file_name(staged));
            if !run_blocking_timeout(self.tool_timeout(), &check, move || toolkit.has_audio(&video)).await? {
                debug!("{:?} has no audio stream", staged);
                return Ok(Vec::new());
            }

            let out = batch.work.subdir(scratch::EXTRACTED_AUDIO_DIR)?;
            let toolkit = self.toolkit.clone();
            let video = staged.to_path_buf();
            let format = self.config.audio.chunk_format.clone();
            let operation = format!("Audio extraction of {}", file_name(staged));
            let extracted = run_blocking_timeout(self.tool_timeout(), &operation, move || {
                toolkit.extract_audio(&video, &out, &format)
            })
            .await?;
            let extracted = ScratchFile::new(extracted);

            let text = batch.audio.transcribe_file(extracted.path(), &chunk_dir).await?;
            (text, MediaFormat::Video)
        } else {
            let text = batch.audio.transcribe_file(staged, &chunk_dir).await?;
            (text, MediaFormat::Audio)
        };

        Ok(vec![RawUnit::Transcript { text, media_format }])
    }
}

fn image_path(image: &PdfImage) -> &Path {
    &image.path
}

fn frame_path(frame: &SampledFrame) -> &Path {
    &frame.path
}

/// Caption every item, skipping images that fail or yield nothing.
///
/// Errors only when no item got a caption and at least one attempt failed,
/// so a path whose captioning broke down entirely is reported.
async fn caption_each<T>(
    captions: &CaptionScheduler,
    items: Vec<T>,
    path_of: fn(&T) -> &Path,
) -> IngestResult<Vec<(T, String)>> {
    let mut captioned = Vec::with_capacity(items.len());
    let mut errors = 0;
    let mut last_error = None;

    for item in items {
        match captions.caption(path_of(&item)).await {
            Ok(Some(text)) => captioned.push((item, text)),
            Ok(None) => debug!("Nothing to say about {:?}, skipping", path_of(&item)),
            Err(e) => {
                warn!("Skipping {:?}: {}", path_of(&item), e);
                errors += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if captioned.is_empty() => {
            warn!("All {} caption attempts failed", errors);
            Err(e)
        }
        _ => Ok(captioned),
    }
}

fn advance(source: &SourceRef, state: &mut FileState, next: FileState) {
    debug!("{}: {} -> {}", source.name, state, next);
    *state = next;
}

fn failure(source: &SourceRef, path: Option<IngestPath>, error: IngestError) -> FileFailure {
    match path {
        Some(path) => warn!("{} failed in the {} path: {}", source.name, path, error),
        None => warn!("{} failed: {}", source.name, error),
    }

    FileFailure {
        file_name: source.name.clone(),
        source_id: source.id.clone(),
        path,
        kind: error.kind(),
        message: error.to_string(),
    }
}

fn failed(
    source: SourceRef,
    kind: MediaKind,
    path: Option<IngestPath>,
    error: IngestError,
    state: &mut FileState,
) -> FileOutcome {
    advance(&source, state, FileState::Failed);

    FileOutcome {
        failures: vec![failure(&source, path, error)],
        report: FileReport {
            source,
            kind,
            state: *state,
            units: 0,
        },
        units: Vec::new(),
    }
}

fn staging_dir(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Pdf => scratch::PDFS_DIR,
        MediaKind::Video => scratch::VIDEOS_DIR,
        MediaKind::Image => scratch::IMAGES_DIR,
        MediaKind::Audio => scratch::AUDIO_DIR,
        MediaKind::Text | MediaKind::Unsupported => scratch::TEXT_DIR,
    }
}

/// File name for a staged upload. Keeps the `<id>-<name>` form so every
/// derived artifact can be traced back to its source.
fn staged_name(source: &SourceRef) -> String {
    source.upload_name().replace(['/', '\\', ':'], "_")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

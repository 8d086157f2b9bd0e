//! Audio transcription with size-bounded chunking.
//!
//! Transcription APIs reject uploads over a byte limit. Larger files are cut
//! into time slices whose length is estimated from the byte ratio, each slice
//! is transcribed in order, and the texts are joined with single spaces.

use crate::error::{IngestError, IngestResult};
use crate::scratch::ScratchFile;
use crate::toolkit::{run_blocking, MediaToolkit};
use lectern_config::AudioConfig;
use lectern_providers::TranscriptionProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upload limit of the hosted Whisper API.
pub const DEFAULT_MAX_BYTES: u64 = 25 * 1024 * 1024;

/// One time slice of an audio file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl ChunkSpan {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// How an audio file is cut so every slice stays near the byte budget.
///
/// Assumes a roughly constant bitrate: a slice of `budget / total * duration`
/// seconds is expected to weigh about `budget` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunkPlan {
    pub total_bytes: u64,
    pub byte_budget: u64,
    pub duration: f64,
    pub chunk_duration: f64,
    spans: Vec<ChunkSpan>,
}

impl AudioChunkPlan {
    pub fn compute(total_bytes: u64, byte_budget: u64, duration: f64) -> IngestResult<Self> {
        if byte_budget == 0 {
            return Err(IngestError::InvalidPlan("byte budget must be positive".to_string()));
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(IngestError::InvalidPlan(format!(
                "duration must be positive, got {}",
                duration
            )));
        }

        if total_bytes <= byte_budget {
            return Ok(Self {
                total_bytes,
                byte_budget,
                duration,
                chunk_duration: duration,
                spans: vec![ChunkSpan {
                    index: 0,
                    start: 0.0,
                    end: duration,
                }],
            });
        }

        let chunk_duration = byte_budget as f64 / total_bytes as f64 * duration;
        let count = total_bytes.div_ceil(byte_budget) as usize;

        let spans = (0..count)
            .map(|index| {
                let start = index as f64 * chunk_duration;
                let end = if index + 1 == count {
                    duration
                } else {
                    ((index + 1) as f64 * chunk_duration).min(duration)
                };
                ChunkSpan { index, start, end }
            })
            .collect();

        Ok(Self {
            total_bytes,
            byte_budget,
            duration,
            chunk_duration,
            spans,
        })
    }

    pub fn spans(&self) -> &[ChunkSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Name of the file holding one slice.
pub fn chunk_file_name(stem: &str, index: usize, format: &str) -> String {
    format!("{}_chunk_{:03}.{}", stem, index, format)
}

/// Transcribes audio through a [`TranscriptionProvider`], chunking when needed.
#[derive(Clone)]
pub struct AudioEngine {
    provider: Arc<dyn TranscriptionProvider>,
    toolkit: Arc<dyn MediaToolkit>,
    max_bytes: u64,
    chunk_format: String,
    timeout: Duration,
}

impl AudioEngine {
    pub fn new(provider: Arc<dyn TranscriptionProvider>, toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self {
            provider,
            toolkit,
            max_bytes: DEFAULT_MAX_BYTES,
            chunk_format: "mp3".to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn from_config(
        provider: Arc<dyn TranscriptionProvider>,
        toolkit: Arc<dyn MediaToolkit>,
        config: &AudioConfig,
    ) -> Self {
        Self::new(provider, toolkit)
            .with_max_bytes(config.max_bytes)
            .with_chunk_format(&config.chunk_format)
            .with_timeout(Duration::from_secs(config.transcription_timeout_seconds))
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_chunk_format(mut self, format: impl Into<String>) -> Self {
        self.chunk_format = format.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transcribe in-memory audio. Oversized input is written to `work_dir`
    /// for slicing and removed afterwards.
    pub async fn transcribe(&self, bytes: Vec<u8>, file_name: &str, work_dir: &Path) -> IngestResult<String> {
        let total = bytes.len() as u64;
        if total <= self.max_bytes {
            return self.call(bytes, file_name).await;
        }

        let path = work_dir.join(file_name);
        let _staged = ScratchFile::new(&path);
        tokio::fs::write(&path, &bytes).await?;
        drop(bytes);

        self.transcribe_chunked(&path, work_dir, total).await
    }

    /// Transcribe an audio file on disk, writing slices to `chunk_dir`.
    pub async fn transcribe_file(&self, path: &Path, chunk_dir: &Path) -> IngestResult<String> {
        let total = tokio::fs::metadata(path).await?.len();
        if total <= self.max_bytes {
            let bytes = tokio::fs::read(path).await?;
            return self.call(bytes, &file_name_of(path)).await;
        }

        self.transcribe_chunked(path, chunk_dir, total).await
    }

    async fn transcribe_chunked(&self, path: &Path, chunk_dir: &Path, total: u64) -> IngestResult<String> {
        let duration = {
            let toolkit = self.toolkit.clone();
            let path = path.to_path_buf();
            run_blocking(move || toolkit.duration(&path)).await?
        };
        let plan = AudioChunkPlan::compute(total, self.max_bytes, duration)?;

        info!(
            "Splitting {:?} ({} bytes, {:.1}s) into {} chunks of ~{:.1}s",
            path,
            total,
            duration,
            plan.len(),
            plan.chunk_duration
        );

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio")
            .to_string();

        let mut parts = Vec::with_capacity(plan.len());
        for span in plan.spans() {
            let chunk_name = chunk_file_name(&stem, span.index, &self.chunk_format);
            let chunk_path = chunk_dir.join(&chunk_name);
            let _guard = ScratchFile::new(&chunk_path);

            self.export(path, &chunk_path, *span).await?;
            let bytes = tokio::fs::read(&chunk_path).await?;
            if bytes.len() as u64 > self.max_bytes {
                warn!(
                    "Chunk {} is {} bytes, over the {} byte budget",
                    chunk_name,
                    bytes.len(),
                    self.max_bytes
                );
            }

            debug!(
                "Transcribing chunk {}/{} [{:.1}s, {:.1}s)",
                span.index + 1,
                plan.len(),
                span.start,
                span.end
            );
            let text = self.call(bytes, &chunk_name).await?;
            if !text.is_empty() {
                parts.push(text);
            }
        }

        Ok(parts.join(" "))
    }

    async fn export(&self, source: &Path, dest: &Path, span: ChunkSpan) -> IngestResult<()> {
        let toolkit = self.toolkit.clone();
        let source: PathBuf = source.to_path_buf();
        let dest: PathBuf = dest.to_path_buf();
        run_blocking(move || toolkit.export_slice(&source, &dest, span.start, span.duration())).await
    }

    async fn call(&self, bytes: Vec<u8>, file_name: &str) -> IngestResult<String> {
        match tokio::time::timeout(self.timeout, self.provider.transcribe(bytes, file_name)).await {
            Ok(result) => Ok(result?.trim().to_string()),
            Err(_) => Err(IngestError::Timeout {
                operation: format!("Transcription of {}", file_name),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string())
}

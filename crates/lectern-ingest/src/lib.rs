//! Lectern Ingest - Multimodal ingestion pipeline.
//!
//! This crate provides:
//! - Media classification and per-batch scratch management
//! - Document parsing (PDF, Office, EPUB, Markdown, HTML, code, data) and chunking
//! - Audio transcription with size-bounded chunking
//! - Image and video frame captioning under a provider quota
//! - Assembly of content units and hand-off to a store

mod assembler;
mod audio;
mod caption;
mod chunker;
mod error;
mod loader;
pub mod parsers;
mod pipeline;
mod scratch;
mod store;
mod toolkit;

pub use assembler::{assemble, RawUnit};
pub use audio::{chunk_file_name, AudioChunkPlan, AudioEngine, ChunkSpan, DEFAULT_MAX_BYTES};
pub use caption::{
    choose_provider, combine_caption, CaptionScheduler, Clock, ManualClock, ProviderChoice, QuotaWindow,
    SystemClock, TesseractExtractor, TextExtractor,
};
pub use chunker::{ChunkConfig, Chunker, DEFAULT_SEPARATORS};
pub use error::{FailureKind, IngestError, IngestResult};
pub use loader::{LoadedDocument, TextChunk, TextCorpusLoader};
pub use pipeline::{BatchOutcome, FileFailure, FileReport, FileState, Pipeline, Providers, UploadedFile};
pub use scratch::{ScratchArea, ScratchFile, WorkDir};
pub use store::ContentStore;
pub use toolkit::{FfmpegToolkit, MediaToolkit};

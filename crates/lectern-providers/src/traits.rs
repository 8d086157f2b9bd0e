//! Provider seams used by the ingestion pipeline.

use crate::error::ProviderResult;
use async_trait::async_trait;

/// Turns audio bytes into text.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Transcribe one audio file. `file_name` carries the container extension.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> ProviderResult<String>;
}

/// Describes an image in text.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Caption one image of the given MIME type.
    async fn caption(&self, image: &[u8], mime: &str) -> ProviderResult<String>;
}

//! The content unit produced by ingestion.

use crate::error::{Error, Result};
use crate::media::MediaFormat;
use crate::source::{BatchContext, SourceId, SourceRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a content unit, a UUIDv5 string.
pub type UnitId = String;

/// Text plus provenance, ready for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: UnitId,
    pub text: String,
    pub source_id: SourceId,
    pub source_name: String,
    pub media_format: MediaFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    /// 1-based page number for units derived from a PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Sequential index of a sampled video frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
    /// Seconds from the start of the video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// File name of the captioned image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    /// Position of a text chunk within its document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

impl ContentUnit {
    pub fn new(source: &SourceRef, media_format: MediaFormat, text: impl Into<String>) -> Self {
        let mut unit = Self {
            id: String::new(),
            text: text.into(),
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            media_format,
            subject: None,
            course: None,
            page: None,
            frame: None,
            timestamp: None,
            image_ref: None,
            chunk_index: None,
        };
        unit.id = unit.stable_id();
        unit
    }

    pub fn with_context(mut self, context: &BatchContext) -> Self {
        self.subject = context.subject.clone();
        self.course = context.course.clone();
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self.id = self.stable_id();
        self
    }

    pub fn with_frame(mut self, frame: u32, timestamp: f64) -> Self {
        self.frame = Some(frame);
        self.timestamp = Some(timestamp);
        self.id = self.stable_id();
        self
    }

    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self.id = self.stable_id();
        self
    }

    pub fn with_chunk_index(mut self, index: u32) -> Self {
        self.chunk_index = Some(index);
        self.id = self.stable_id();
        self
    }

    /// Deterministic id over the source, format, locator fields and text.
    ///
    /// Re-ingesting the same file yields the same ids, so upserts replace
    /// rather than duplicate.
    pub fn stable_id(&self) -> UnitId {
        let locator = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            opt(self.page),
            opt(self.frame),
            self.image_ref.as_deref().unwrap_or(""),
            opt(self.chunk_index),
            self.timestamp.map(|t| format!("{:.2}", t)).unwrap_or_default(),
        );
        let name = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.source_id, self.media_format, locator, self.text
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    /// Check the unit is fit to hand to a store.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::InvalidUnit(format!(
                "empty text for source {}",
                self.source_id
            )));
        }
        if self.source_id.to_string().trim().is_empty() {
            return Err(Error::InvalidSource("empty source id".to_string()));
        }
        Ok(())
    }
}

fn opt(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

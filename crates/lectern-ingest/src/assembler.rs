//! Turn sub-pipeline output into content units.

use lectern_core::{BatchContext, ContentUnit, MediaFormat, SourceRef};

/// Text produced by one sub-pipeline, before provenance is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum RawUnit {
    /// A chunk of document text.
    Text {
        text: String,
        page: Option<u32>,
        chunk_index: u32,
    },
    /// Caption of a standalone image or an image taken from a PDF.
    Image {
        text: String,
        image_ref: String,
        page: Option<u32>,
    },
    /// Caption of a sampled video frame.
    Frame {
        text: String,
        image_ref: String,
        frame: u32,
        timestamp: f64,
    },
    /// Transcript of an audio file or a video's soundtrack.
    Transcript { text: String, media_format: MediaFormat },
}

impl RawUnit {
    pub fn text(&self) -> &str {
        match self {
            RawUnit::Text { text, .. }
            | RawUnit::Image { text, .. }
            | RawUnit::Frame { text, .. }
            | RawUnit::Transcript { text, .. } => text,
        }
    }

    fn into_unit(self, source: &SourceRef) -> ContentUnit {
        match self {
            RawUnit::Text {
                text,
                page,
                chunk_index,
            } => {
                let unit = ContentUnit::new(source, MediaFormat::Text, text).with_chunk_index(chunk_index);
                match page {
                    Some(page) => unit.with_page(page),
                    None => unit,
                }
            }
            RawUnit::Image {
                text,
                image_ref,
                page,
            } => {
                let unit = ContentUnit::new(source, MediaFormat::Image, text).with_image_ref(image_ref);
                match page {
                    Some(page) => unit.with_page(page),
                    None => unit,
                }
            }
            RawUnit::Frame {
                text,
                image_ref,
                frame,
                timestamp,
            } => ContentUnit::new(source, MediaFormat::Video, text)
                .with_image_ref(image_ref)
                .with_frame(frame, timestamp),
            RawUnit::Transcript { text, media_format } => ContentUnit::new(source, media_format, text),
        }
    }
}

/// Attach source identity and batch context. Units without text are dropped.
pub fn assemble(raw: Vec<RawUnit>, source: &SourceRef, context: &BatchContext) -> Vec<ContentUnit> {
    raw.into_iter()
        .filter(|r| !r.text().trim().is_empty())
        .map(|r| r.into_unit(source).with_context(context))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::SourceId;

    #[test]
    fn test_assemble_from_upload_name() {
        let source = SourceRef::from_upload_name("42-lecture.pdf").unwrap();
        let ctx = BatchContext::new().with_subject("Programming").with_course("CS101");
        let units = assemble(
            vec![
                RawUnit::Text {
                    text: "Loops repeat work.".into(),
                    page: Some(3),
                    chunk_index: 0,
                },
                RawUnit::Image {
                    text: "Caption by model:\nA flowchart".into(),
                    image_ref: "42-lecture_page_3_img_0.png".into(),
                    page: Some(3),
                },
            ],
            &source,
            &ctx,
        );

        assert_eq!(units.len(), 2);
        for unit in &units {
            assert_eq!(unit.source_id, SourceId::Numeric(42));
            assert_eq!(unit.source_name, "lecture.pdf");
            assert_eq!(unit.subject.as_deref(), Some("Programming"));
            assert_eq!(unit.course.as_deref(), Some("CS101"));
            assert_eq!(unit.page, Some(3));
            assert!(unit.validate().is_ok());
        }
        assert_eq!(units[0].media_format, MediaFormat::Text);
        assert_eq!(units[0].chunk_index, Some(0));
        assert_eq!(units[1].media_format, MediaFormat::Image);
        assert_ne!(units[0].id, units[1].id);
    }

    #[test]
    fn test_frames_and_transcripts() {
        let source = SourceRef::new(7, "demo.mp4");
        let units = assemble(
            vec![
                RawUnit::Frame {
                    text: "A terminal window".into(),
                    image_ref: "7-demo_time_2.00_frame_0002.png".into(),
                    frame: 2,
                    timestamp: 2.0,
                },
                RawUnit::Transcript {
                    text: "Today we debug.".into(),
                    media_format: MediaFormat::Video,
                },
            ],
            &source,
            &BatchContext::default(),
        );

        assert_eq!(units[0].frame, Some(2));
        assert_eq!(units[0].timestamp, Some(2.0));
        assert_eq!(units[0].media_format, MediaFormat::Video);
        assert_eq!(units[1].media_format, MediaFormat::Video);
        assert_eq!(units[1].frame, None);
        assert!(units.iter().all(|u| u.subject.is_none()));
    }

    #[test]
    fn test_empty_text_is_dropped() {
        let source = SourceRef::new(1, "talk.mp3");
        let units = assemble(
            vec![RawUnit::Transcript {
                text: "  ".into(),
                media_format: MediaFormat::Audio,
            }],
            &source,
            &BatchContext::default(),
        );
        assert!(units.is_empty());
    }

    #[test]
    fn test_ids_are_stable() {
        let source = SourceRef::new(42, "lecture.pdf");
        let raw = vec![RawUnit::Text {
            text: "Same text".into(),
            page: Some(1),
            chunk_index: 4,
        }];
        let a = assemble(raw.clone(), &source, &BatchContext::default());
        let b = assemble(raw, &source, &BatchContext::new().with_subject("Other"));
        assert_eq!(a[0].id, b[0].id);
    }
}

//! Media classification.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions the text corpus loader knows how to read.
pub const TEXT_EXTENSIONS: &[&str] = &[
    // Prose and markup
    "txt", "text", "log", "md", "markdown", "rst", "org", "html", "htm", "xml", "tex",
    // Office and e-books
    "docx", "pptx", "xlsx", "epub",
    // Data
    "csv", "json", "yaml", "yml", "toml", "ipynb",
    // Code
    "py", "c", "h", "cpp", "hpp", "cc", "rs", "js", "jsx", "java", "go", "rb", "sh", "sql",
    "css", "php", "kt", "swift", "scala", "lua", "r",
];

/// Extensions accepted as standalone images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

/// Format tag carried by every content unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Text,
    Image,
    Audio,
    Video,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Text => "text",
            MediaFormat::Image => "image",
            MediaFormat::Audio => "audio",
            MediaFormat::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(MediaFormat::Text),
            "image" => Some(MediaFormat::Image),
            "audio" => Some(MediaFormat::Audio),
            "video" => Some(MediaFormat::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sub-pipeline a file is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPath {
    Audio,
    Image,
    PdfImages,
    VideoFrames,
    Text,
}

impl IngestPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestPath::Audio => "audio",
            IngestPath::Image => "image",
            IngestPath::PdfImages => "pdf_images",
            IngestPath::VideoFrames => "video_frames",
            IngestPath::Text => "text",
        }
    }
}

impl std::fmt::Display for IngestPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of an uploaded file, decided once at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Text,
    Pdf,
    Image,
    Audio,
    Video,
    Unsupported,
}

impl MediaKind {
    /// Classify a file by its declared MIME type, falling back to the
    /// MIME type guessed from its extension.
    pub fn classify(file_name: &str, declared_mime: Option<&str>) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let mime = declared_mime
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty() && m != "application/octet-stream")
            .or_else(|| mime_guess::from_path(file_name).first_raw().map(str::to_string))
            .unwrap_or_default();

        if ext == "pdf" || mime == "application/pdf" {
            return MediaKind::Pdf;
        }
        if mime.starts_with("audio/") {
            return MediaKind::Audio;
        }
        if mime.starts_with("video/") {
            return MediaKind::Video;
        }
        if mime.starts_with("image/") && IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return MediaKind::Image;
        }
        if TEXT_EXTENSIONS.contains(&ext.as_str()) || mime.starts_with("text/") {
            return MediaKind::Text;
        }

        MediaKind::Unsupported
    }

    /// Sub-pipelines a file of this kind enters.
    pub fn paths(&self) -> &'static [IngestPath] {
        match self {
            MediaKind::Text => &[IngestPath::Text],
            MediaKind::Pdf => &[IngestPath::PdfImages, IngestPath::Text],
            MediaKind::Image => &[IngestPath::Image],
            MediaKind::Audio => &[IngestPath::Audio],
            MediaKind::Video => &[IngestPath::VideoFrames, IngestPath::Audio],
            MediaKind::Unsupported => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Pdf => "pdf",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(MediaKind::classify("lecture.mp3", None), MediaKind::Audio);
        assert_eq!(MediaKind::classify("lecture.wav", None), MediaKind::Audio);
        assert_eq!(MediaKind::classify("demo.mp4", None), MediaKind::Video);
        assert_eq!(MediaKind::classify("demo.MKV", None), MediaKind::Video);
        assert_eq!(MediaKind::classify("slide.png", None), MediaKind::Image);
        assert_eq!(MediaKind::classify("notes.pdf", None), MediaKind::Pdf);
        assert_eq!(MediaKind::classify("notes.md", None), MediaKind::Text);
        assert_eq!(MediaKind::classify("main.py", None), MediaKind::Text);
        assert_eq!(MediaKind::classify("deck.pptx", None), MediaKind::Text);
        assert_eq!(MediaKind::classify("lab.ipynb", None), MediaKind::Text);
        assert_eq!(MediaKind::classify("archive.tar.gz", None), MediaKind::Unsupported);
        assert_eq!(MediaKind::classify("no_extension", None), MediaKind::Unsupported);
    }

    #[test]
    fn test_declared_mime_wins() {
        assert_eq!(
            MediaKind::classify("upload.bin", Some("audio/mpeg")),
            MediaKind::Audio
        );
        assert_eq!(
            MediaKind::classify("upload", Some("application/pdf")),
            MediaKind::Pdf
        );
        // Generic octet-stream falls back to the extension
        assert_eq!(
            MediaKind::classify("talk.mp3", Some("application/octet-stream")),
            MediaKind::Audio
        );
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            MediaKind::Pdf.paths(),
            &[IngestPath::PdfImages, IngestPath::Text]
        );
        assert_eq!(
            MediaKind::Video.paths(),
            &[IngestPath::VideoFrames, IngestPath::Audio]
        );
        assert!(MediaKind::Unsupported.paths().is_empty());
    }

    #[test]
    fn test_media_format_roundtrip() {
        for format in [
            MediaFormat::Text,
            MediaFormat::Image,
            MediaFormat::Audio,
            MediaFormat::Video,
        ] {
            assert_eq!(MediaFormat::from_str(format.as_str()), Some(format));
        }
        assert_eq!(MediaFormat::from_str("VIDEO"), Some(MediaFormat::Video));
        assert_eq!(MediaFormat::from_str("pdf"), None);
    }
}

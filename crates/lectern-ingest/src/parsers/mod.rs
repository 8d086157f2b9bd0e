//! Document parsers for the text corpus.

mod markdown;
mod markup;
mod notebook;
mod office;
mod pdf;
mod tabular;
mod text;

pub use markdown::MarkdownParser;
pub use markup::{html_to_text, HtmlParser, XmlParser};
pub use notebook::NotebookParser;
pub use office::{DocxParser, EpubParser, PptxParser, XlsxParser};
pub use pdf::PdfParser;
pub use tabular::CsvParser;
pub use text::TextParser;

use crate::error::{IngestError, IngestResult};
use std::path::Path;

/// One addressable part of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub text: String,
    /// 1-based page (PDF) or slide (PPTX) number.
    pub page: Option<u32>,
}

/// Parsed document content.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Text in reading order.
    pub sections: Vec<Section>,
    /// Document title (if extracted).
    pub title: Option<String>,
    /// Extracted metadata.
    pub metadata: serde_json::Value,
}

impl ParsedDocument {
    /// Create a document with a single unpaged section.
    pub fn new(content: impl Into<String>) -> Self {
        Self::from_sections(vec![Section {
            text: content.into(),
            page: None,
        }])
    }

    pub fn from_sections(sections: Vec<Section>) -> Self {
        Self {
            sections,
            title: None,
            metadata: serde_json::json!({}),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// All section text joined by blank lines.
    pub fn content(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.text.trim().is_empty())
    }
}

/// Trait for document parsers.
pub trait DocumentParser: Send + Sync {
    /// Parse a file at the given path.
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument>;

    /// Get the supported file extensions.
    fn extensions(&self) -> &[&str];

    /// Check if this parser supports the given extension.
    fn supports(&self, extension: &str) -> bool {
        self.extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// Every parser, most specific first.
pub fn parsers() -> Vec<Box<dyn DocumentParser>> {
    vec![
        Box::new(PdfParser::new()),
        Box::new(MarkdownParser::new()),
        Box::new(HtmlParser::new()),
        Box::new(XmlParser::new()),
        Box::new(DocxParser),
        Box::new(PptxParser),
        Box::new(XlsxParser),
        Box::new(EpubParser),
        Box::new(CsvParser::new()),
        Box::new(NotebookParser::new()),
        Box::new(TextParser::new()),
    ]
}

/// Get the parser for a file extension.
pub fn parser_for(extension: &str) -> Option<Box<dyn DocumentParser>> {
    parsers().into_iter().find(|p| p.supports(extension))
}

/// Parse a file based on its extension.
pub fn parse_file(path: &Path) -> IngestResult<ParsedDocument> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let parser = parser_for(extension)
        .ok_or_else(|| IngestError::UnsupportedFileType(extension.to_string()))?;
    parser.parse(path)
}

/// File stem, used as a fallback title.
pub(crate) fn stem_title(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::TEXT_EXTENSIONS;

    #[test]
    fn test_every_text_extension_has_a_parser() {
        for ext in TEXT_EXTENSIONS {
            assert!(parser_for(ext).is_some(), "no parser for .{}", ext);
        }
        assert!(parser_for("pdf").is_some());
        assert!(parser_for("exe").is_none());
    }

    #[test]
    fn test_content_skips_blank_sections() {
        let doc = ParsedDocument::from_sections(vec![
            Section { text: "one".into(), page: Some(1) },
            Section { text: "  ".into(), page: Some(2) },
            Section { text: "three".into(), page: Some(3) },
        ]);
        assert_eq!(doc.content(), "one\n\nthree");
        assert!(!doc.is_empty());
        assert!(ParsedDocument::new(" \n").is_empty());
    }

    #[test]
    fn test_parse_file_unsupported() {
        let result = parse_file(Path::new("/tmp/tool.exe"));
        assert!(matches!(result, Err(IngestError::UnsupportedFileType(ext)) if ext == "exe"));
    }
}

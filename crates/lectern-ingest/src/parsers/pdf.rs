//! PDF text extraction, one section per page.

use super::{stem_title, DocumentParser, ParsedDocument, Section};
use crate::error::{IngestError, IngestResult};
use std::path::Path;
use tracing::debug;

/// Parser for PDF documents.
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        if !path.exists() {
            return Err(IngestError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }

        // pdf-extract panics on some malformed files instead of returning an error.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path))
            .map_err(|_| IngestError::parse(path, "PDF extraction panicked"))?
            .map_err(|e| IngestError::parse(path, format!("Failed to extract PDF text: {}", e)))?;

        let sections: Vec<Section> = pages
            .iter()
            .enumerate()
            .map(|(i, text)| Section {
                text: clean_pdf_text(text),
                page: Some(i as u32 + 1),
            })
            .collect();

        debug!("Extracted {} pages from {:?}", sections.len(), path);

        let metadata = serde_json::json!({
            "format": "pdf",
            "pages": sections.len(),
        });

        let doc = ParsedDocument::from_sections(sections).with_metadata(metadata);
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

/// Collapse the ragged whitespace PDF extraction leaves behind.
fn clean_pdf_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !result.is_empty() {
                result.push('\n');
            }
            continue;
        }
        blank_run = 0;
        result.push_str(&line);
        result.push('\n');
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_clean_pdf_text() {
        let raw = "  Week 3:   Loops \n\n\n\nA loop   repeats\n work.\n\n";
        assert_eq!(clean_pdf_text(raw), "Week 3: Loops\n\nA loop repeats\nwork.");
    }

    #[test]
    fn test_corrupt_pdf_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::with_suffix(".pdf").unwrap();
        file.write_all(b"this is not a pdf").unwrap();

        let result = PdfParser::new().parse(file.path());
        assert!(matches!(result, Err(IngestError::ParseError { .. })));
    }

    #[test]
    fn test_missing_pdf() {
        let result = PdfParser::new().parse(Path::new("/nonexistent/lecture.pdf"));
        assert!(matches!(result, Err(IngestError::Io(_))));
    }
}

//! CSV parser. Each record becomes its own section of `header: value` lines.

use super::{stem_title, DocumentParser, ParsedDocument, Section};
use crate::error::{IngestError, IngestResult};
use std::path::Path;

pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for CsvParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| IngestError::parse(path, e))?;

        let headers = reader
            .headers()
            .map_err(|e| IngestError::parse(path, e))?
            .clone();

        let mut sections = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| IngestError::parse(path, e))?;
            let lines: Vec<String> = record
                .iter()
                .enumerate()
                .map(|(i, value)| match headers.get(i) {
                    Some(header) if !header.is_empty() => format!("{}: {}", header, value.trim()),
                    _ => value.trim().to_string(),
                })
                .collect();
            sections.push(Section {
                text: lines.join("\n"),
                page: None,
            });
        }

        let metadata = serde_json::json!({
            "format": "csv",
            "columns": headers.iter().collect::<Vec<_>>(),
            "rows": sections.len(),
        });

        let doc = ParsedDocument::from_sections(sections).with_metadata(metadata);
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["csv"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_csv() {
        let mut file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "week,topic\n1,Variables\n2, Loops").unwrap();

        let doc = CsvParser::new().parse(file.path()).unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].text, "week: 1\ntopic: Variables");
        assert_eq!(doc.sections[1].text, "week: 2\ntopic: Loops");
        assert_eq!(doc.metadata["rows"], 2);
    }
}

//! Jupyter notebook parser.

use super::{stem_title, DocumentParser, ParsedDocument};
use crate::error::{IngestError, IngestResult};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    cell_type: String,
    #[serde(default)]
    source: CellSource,
}

/// Cell source is either one string or a list of lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    fn text(&self) -> String {
        match self {
            CellSource::Text(s) => s.clone(),
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

/// Renders markdown and code cells; outputs are skipped.
pub struct NotebookParser;

impl NotebookParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NotebookParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for NotebookParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let content = std::fs::read_to_string(path)?;
        let notebook: Notebook =
            serde_json::from_str(&content).map_err(|e| IngestError::parse(path, e))?;

        let mut blocks = Vec::new();
        for cell in &notebook.cells {
            let source = cell.source.text();
            let source = source.trim();
            if source.is_empty() {
                continue;
            }
            match cell.cell_type.as_str() {
                "code" => blocks.push(format!("```\n{}\n```", source)),
                _ => blocks.push(source.to_string()),
            }
        }

        let metadata = serde_json::json!({
            "format": "notebook",
            "cells": notebook.cells.len(),
        });

        let doc = ParsedDocument::new(blocks.join("\n\n")).with_metadata(metadata);
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["ipynb"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_notebook() {
        let mut file = tempfile::NamedTempFile::with_suffix(".ipynb").unwrap();
        write!(
            file,
            r##"{{"cells": [
                {{"cell_type": "markdown", "source": ["# Lab 2\n", "Sorting"]}},
                {{"cell_type": "code", "source": "sorted([3, 1, 2])", "outputs": []}},
                {{"cell_type": "code", "source": []}}
            ]}}"##
        )
        .unwrap();

        let doc = NotebookParser::new().parse(file.path()).unwrap();
        assert_eq!(doc.content(), "# Lab 2\nSorting\n\n```\nsorted([3, 1, 2])\n```");
        assert_eq!(doc.metadata["cells"], 3);
    }

    #[test]
    fn test_invalid_notebook() {
        let mut file = tempfile::NamedTempFile::with_suffix(".ipynb").unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            NotebookParser::new().parse(file.path()),
            Err(IngestError::ParseError { .. })
        ));
    }
}

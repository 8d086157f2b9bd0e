//! Text corpus loading: parse documents and split them into chunks.

use crate::chunker::{ChunkConfig, Chunker};
use crate::error::IngestResult;
use crate::parsers::{self, DocumentParser, ParsedDocument};
use lectern_config::TextConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One chunk of a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    /// Page or slide the chunk came from.
    pub page: Option<u32>,
    /// Position within the document, counted across pages.
    pub chunk_index: u32,
}

/// Chunks of one file.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub title: Option<String>,
    pub chunks: Vec<TextChunk>,
}

/// Loads text documents with the matching parser and chunks them.
#[derive(Debug, Clone, Default)]
pub struct TextCorpusLoader {
    chunker: Chunker,
}

impl TextCorpusLoader {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            chunker: Chunker::new(config),
        }
    }

    pub fn from_config(config: &TextConfig) -> Self {
        Self::new(ChunkConfig::from_text_config(config))
    }

    /// Parse and chunk a single file.
    pub fn load_file(&self, path: &Path) -> IngestResult<LoadedDocument> {
        let parsed = parsers::parse_file(path)?;
        Ok(self.finish(path, parsed))
    }

    /// Parse with an explicit parser, for files whose extension says nothing.
    pub fn load_with(&self, path: &Path, parser: &dyn DocumentParser) -> IngestResult<LoadedDocument> {
        let parsed = parser.parse(path)?;
        Ok(self.finish(path, parsed))
    }

    fn finish(&self, path: &Path, parsed: ParsedDocument) -> LoadedDocument {
        let chunks = self.chunk_document(&parsed);
        debug!("Loaded {:?}: {} chunks", path, chunks.len());

        LoadedDocument {
            path: path.to_path_buf(),
            title: parsed.title,
            chunks,
        }
    }

    /// Every supported file below `directory`, in path order.
    pub fn load(&self, directory: &Path) -> IngestResult<Vec<LoadedDocument>> {
        let mut documents = Vec::new();

        for entry in WalkDir::new(directory).sort_by_file_name() {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let supported = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| parsers::parser_for(ext).is_some());
            if !supported {
                debug!("Skipping unsupported file {:?}", entry.path());
                continue;
            }
            documents.push(self.load_file(entry.path())?);
        }

        info!("Loaded {} documents from {:?}", documents.len(), directory);
        Ok(documents)
    }

    fn chunk_document(&self, document: &ParsedDocument) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        for section in &document.sections {
            for text in self.chunker.chunk_text(&section.text) {
                if text.trim().is_empty() {
                    continue;
                }
                chunks.push(TextChunk {
                    text: text.to_string(),
                    page: section.page,
                    chunk_index: chunks.len() as u32,
                });
            }
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Section;

    #[test]
    fn test_chunk_indices_span_pages() {
        let loader = TextCorpusLoader::new(ChunkConfig {
            chunk_size: 40,
            chunk_overlap: 0,
        });
        let doc = ParsedDocument::from_sections(vec![
            Section {
                text: "Page one talks about variables and types in Python.".into(),
                page: Some(1),
            },
            Section {
                text: "   ".into(),
                page: Some(2),
            },
            Section {
                text: "Page three covers loops.".into(),
                page: Some(3),
            },
        ]);

        let chunks = loader.chunk_document(&doc);
        assert!(chunks.len() >= 3);
        let last = chunks.last().unwrap();
        assert_eq!(last.page, Some(3));
        assert_eq!(last.text, "Page three covers loops.");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_ne!(chunk.page, Some(2));
        }
    }

    #[test]
    fn test_chunks_keep_exact_spans() {
        let loader = TextCorpusLoader::new(ChunkConfig {
            chunk_size: 40,
            chunk_overlap: 0,
        });
        let text = "Page one talks about variables and types.\n\nLoops repeat work.  Functions name it.";
        let doc = ParsedDocument::from_sections(vec![Section {
            text: text.into(),
            page: Some(1),
        }]);

        let chunks = loader.chunk_document(&doc);
        assert!(chunks.len() > 1);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "# Sorting\n\nMerge sort splits the list.").unwrap();
        std::fs::write(dir.path().join("a.txt"), "Big-O notation").unwrap();
        std::fs::write(dir.path().join("skip.bin"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.py"), "print('hi')").unwrap();

        let docs = TextCorpusLoader::default().load(dir.path()).unwrap();
        let names: Vec<String> = docs
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "c.py"]);
        assert_eq!(docs[1].title.as_deref(), Some("Sorting"));
        assert_eq!(docs[1].chunks[0].text, "Sorting\n\nMerge sort splits the list.");
    }

    #[test]
    fn test_load_with_explicit_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README");
        std::fs::write(&path, "Office hours: Tuesday").unwrap();

        assert!(TextCorpusLoader::default().load_file(&path).is_err());
        let doc = TextCorpusLoader::default()
            .load_with(&path, &crate::parsers::TextParser::new())
            .unwrap();
        assert_eq!(doc.chunks[0].text, "Office hours: Tuesday");
    }
}

//! Plain text and source code parser.

use super::{stem_title, DocumentParser, ParsedDocument};
use crate::error::IngestResult;
use std::path::Path;

/// Parser for plain text, structured data files and source code.
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        Self
    }

    fn language(extension: &str) -> Option<&'static str> {
        Some(match extension {
            "py" => "python",
            "c" | "h" => "c",
            "cpp" | "hpp" | "cc" => "cpp",
            "rs" => "rust",
            "js" | "jsx" => "javascript",
            "java" => "java",
            "go" => "go",
            "rb" => "ruby",
            "sh" => "shell",
            "sql" => "sql",
            "css" => "css",
            "php" => "php",
            "kt" => "kotlin",
            "swift" => "swift",
            "scala" => "scala",
            "lua" => "lua",
            "r" => "r",
            _ => return None,
        })
    }
}

impl Default for TextParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for TextParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8_lossy(&bytes).replace("\r\n", "\n");

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let mut metadata = serde_json::json!({
            "format": "text",
            "extension": extension,
            "lines": content.lines().count(),
        });
        if let Some(language) = Self::language(&extension) {
            metadata["language"] = serde_json::json!(language);
        }

        let doc = ParsedDocument::new(content.trim_end()).with_metadata(metadata);
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &[
            "txt", "text", "log", "rst", "org", "tex", "json", "yaml", "yml", "toml", "py", "c",
            "h", "cpp", "hpp", "cc", "rs", "js", "jsx", "java", "go", "rb", "sh", "sql", "css",
            "php", "kt", "swift", "scala", "lua", "r",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_code() {
        let mut file = NamedTempFile::with_suffix(".py").unwrap();
        write!(file, "def add(a, b):\r\n    return a + b\r\n").unwrap();

        let doc = TextParser::new().parse(file.path()).unwrap();
        assert_eq!(doc.content(), "def add(a, b):\n    return a + b");
        assert_eq!(doc.metadata["language"], "python");
        assert_eq!(doc.metadata["lines"], 2);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        file.write_all(b"caf\xe9 notes").unwrap();

        let doc = TextParser::new().parse(file.path()).unwrap();
        assert!(doc.content().starts_with("caf"));
        assert!(doc.content().ends_with(" notes"));
        assert!(doc.metadata.get("language").is_none());
    }
}

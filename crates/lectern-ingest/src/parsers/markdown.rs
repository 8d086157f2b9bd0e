//! Markdown document parser.

use super::{stem_title, DocumentParser, ParsedDocument};
use crate::error::IngestResult;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use std::path::Path;

/// Parser for Markdown files.
pub struct MarkdownParser {
    /// Whether to keep code fences around code blocks.
    preserve_code_blocks: bool,
}

impl MarkdownParser {
    /// Create a new markdown parser.
    pub fn new() -> Self {
        Self {
            preserve_code_blocks: true,
        }
    }

    /// Render markdown to plain text, returning the first H1 if any.
    fn extract_text(&self, markdown: &str) -> (String, Option<String>) {
        let parser = Parser::new(markdown);
        let mut text = String::new();
        let mut title: Option<String> = None;
        let mut in_heading = false;
        let mut heading_level: Option<HeadingLevel> = None;
        let mut current_heading = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::Heading(level, _, _)) => {
                    in_heading = true;
                    heading_level = Some(level);
                    current_heading.clear();
                }
                Event::End(Tag::Heading(_, _, _)) => {
                    in_heading = false;
                    if heading_level == Some(HeadingLevel::H1) && title.is_none() {
                        title = Some(current_heading.trim().to_string());
                    }
                    text.push_str(&current_heading);
                    text.push_str("\n\n");
                    heading_level = None;
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    if self.preserve_code_blocks {
                        text.push_str("```\n");
                    }
                }
                Event::End(Tag::CodeBlock(_)) => {
                    if self.preserve_code_blocks {
                        text.push_str("```");
                    }
                    text.push_str("\n\n");
                }
                Event::End(Tag::Paragraph) => {
                    text.push_str("\n\n");
                }
                Event::End(Tag::List(_)) => {
                    text.push('\n');
                }
                Event::Start(Tag::Item) => {
                    text.push_str("- ");
                }
                Event::End(Tag::Item) => {
                    text.push('\n');
                }
                Event::Text(t) => {
                    if in_heading {
                        current_heading.push_str(&t);
                    } else {
                        text.push_str(&t);
                    }
                }
                Event::Code(code) => {
                    let target = if in_heading { &mut current_heading } else { &mut text };
                    target.push('`');
                    target.push_str(&code);
                    target.push('`');
                }
                Event::SoftBreak | Event::HardBreak => {
                    text.push('\n');
                }
                _ => {}
            }
        }

        (text.trim().to_string(), title)
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for MarkdownParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let content = std::fs::read_to_string(path)?;
        let (text, title) = self.extract_text(&content);

        let metadata = serde_json::json!({
            "format": "markdown",
            "original_length": content.len(),
        });

        let doc = ParsedDocument::new(text).with_metadata(metadata);
        Ok(match title.or_else(|| stem_title(path)) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown", "mdown", "mkd"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_markdown() {
        let mut file = NamedTempFile::with_suffix(".md").unwrap();
        writeln!(
            file,
            r#"# Loops in Python

A loop repeats a block of code.

## For loops

Use `for` to walk a [sequence](https://docs.python.org).

```python
for i in range(3):
    print(i)
```

- while
- for
"#
        )
        .unwrap();

        let doc = MarkdownParser::new().parse(file.path()).unwrap();
        let content = doc.content();

        assert_eq!(doc.title, Some("Loops in Python".to_string()));
        assert!(content.contains("A loop repeats a block of code."));
        assert!(content.contains("For loops"));
        assert!(content.contains("`for`"));
        assert!(content.contains("print(i)"));
        assert!(content.contains("- while"));
        assert!(!content.contains("https://docs.python.org"));
    }

    #[test]
    fn test_title_falls_back_to_file_name() {
        let mut file = NamedTempFile::with_suffix(".md").unwrap();
        writeln!(file, "Just some text without a heading.").unwrap();

        let doc = MarkdownParser::new().parse(file.path()).unwrap();
        assert!(doc.title.is_some());
        assert_eq!(doc.metadata["format"], "markdown");
    }
}

//! HTML and XML parsers.

use super::{stem_title, DocumentParser, ParsedDocument};
use crate::error::{IngestError, IngestResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

struct HtmlPatterns {
    hidden: Regex,
    title: Regex,
    block: Regex,
    tag: Regex,
    entity: Regex,
}

/// Compiled once; the patterns are constants.
fn patterns() -> &'static HtmlPatterns {
    static PATTERNS: OnceLock<HtmlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| HtmlPatterns {
        hidden: Regex::new(
            r"(?is)<(script|style|head|title|noscript)\b[^>]*>.*?</(script|style|head|title|noscript)\s*>|<!--.*?-->",
        )
        .expect("Invalid regex"),
        title: Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("Invalid regex"),
        block: Regex::new(
            r"(?i)<br\s*/?>|</?(p|div|li|ul|ol|tr|table|h[1-6]|section|article|blockquote|pre)\b[^>]*>",
        )
        .expect("Invalid regex"),
        tag: Regex::new(r"(?s)<[^>]*>").expect("Invalid regex"),
        entity: Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("Invalid regex"),
    })
}

fn decode_entity(entity: &str) -> Option<String> {
    let decoded = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some(decoded.to_string())
}

/// Strip markup from an HTML page, keeping block structure as line breaks.
pub fn html_to_text(html: &str) -> String {
    let p = patterns();
    let text = p.hidden.replace_all(html, " ");
    let text = p.block.replace_all(&text, "\n");
    let text = p.tag.replace_all(&text, "");
    let text = p.entity.replace_all(&text, |caps: &regex::Captures| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });

    let mut lines = Vec::new();
    let mut blank = false;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !blank && !lines.is_empty() {
                lines.push(String::new());
            }
            blank = true;
        } else {
            lines.push(line);
            blank = false;
        }
    }
    lines.join("\n").trim().to_string()
}

fn html_title(html: &str) -> Option<String> {
    let title = patterns().title.captures(html)?.get(1)?.as_str();
    let title = html_to_text(title);
    (!title.is_empty()).then_some(title)
}

/// Parser for HTML pages.
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for HtmlParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let bytes = std::fs::read(path)?;
        let html = String::from_utf8_lossy(&bytes);

        let doc = ParsedDocument::new(html_to_text(&html))
            .with_metadata(serde_json::json!({ "format": "html" }));
        Ok(match html_title(&html).or_else(|| stem_title(path)) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["html", "htm", "xhtml"]
    }
}

/// Collect the text nodes of an XML document, one per line.
pub(crate) fn xml_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut parts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).trim().to_string();
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML error at {}: {}", reader.buffer_position(), e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(parts.join("\n"))
}

/// Parser for generic XML documents.
pub struct XmlParser;

impl XmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for XmlParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let content = std::fs::read_to_string(path)?;
        let text = xml_text(&content).map_err(|e| IngestError::parse(path, e))?;

        let doc = ParsedDocument::new(text).with_metadata(serde_json::json!({ "format": "xml" }));
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["xml"]
    }
}

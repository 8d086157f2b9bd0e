//! Office Open XML and EPUB parsers.
//!
//! All four formats are zip containers of XML parts, read with `zip` and
//! streamed through `quick-xml`.

use super::markup::html_to_text;
use super::{stem_title, DocumentParser, ParsedDocument, Section};
use crate::error::{IngestError, IngestResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

type Archive = ZipArchive<File>;

fn open(path: &Path) -> IngestResult<Archive> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|e| IngestError::parse(path, format!("not a zip container: {}", e)))
}

/// Read one part as text. `None` when the part does not exist.
fn read_part(archive: &mut Archive, name: &str, path: &Path) -> IngestResult<Option<String>> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(IngestError::parse(path, format!("{}: {}", name, e))),
    };
    let mut content = String::new();
    part.read_to_string(&mut content)
        .map_err(|e| IngestError::parse(path, format!("{}: {}", name, e)))?;
    Ok(Some(content))
}

/// Part names matching `<prefix><n><suffix>`, ordered by `n`.
fn numbered_parts(archive: &Archive, prefix: &str, suffix: &str) -> Vec<(u32, String)> {
    let mut parts: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix(prefix)?.strip_suffix(suffix)?.parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    parts.sort();
    parts
}

fn attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Text inside `text_tag` elements, with a line break after each `break_tag`.
fn run_text(xml: &str, text_tag: &[u8], break_tag: &[u8]) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == text_tag => in_text = true,
            Ok(Event::End(e)) => {
                let name = e.name();
                if name.as_ref() == text_tag {
                    in_text = false;
                } else if name.as_ref() == break_tag && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(Event::Text(e)) if in_text => {
                out.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim().to_string())
}

/// Word documents.
pub struct DocxParser;

impl DocumentParser for DocxParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let mut archive = open(path)?;
        let xml = read_part(&mut archive, "word/document.xml", path)?
            .ok_or_else(|| IngestError::parse(path, "missing word/document.xml"))?;
        let text = run_text(&xml, b"w:t", b"w:p").map_err(|e| IngestError::parse(path, e))?;

        let doc = ParsedDocument::new(text).with_metadata(serde_json::json!({ "format": "docx" }));
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["docx"]
    }
}

/// PowerPoint decks, one section per slide.
pub struct PptxParser;

impl DocumentParser for PptxParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let mut archive = open(path)?;
        let slides = numbered_parts(&archive, "ppt/slides/slide", ".xml");

        let mut sections = Vec::with_capacity(slides.len());
        for (number, name) in slides {
            let Some(xml) = read_part(&mut archive, &name, path)? else {
                continue;
            };
            let text = run_text(&xml, b"a:t", b"a:p").map_err(|e| IngestError::parse(path, e))?;
            sections.push(Section {
                text,
                page: Some(number),
            });
        }

        let metadata = serde_json::json!({
            "format": "pptx",
            "slides": sections.len(),
        });
        let doc = ParsedDocument::from_sections(sections).with_metadata(metadata);
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["pptx"]
    }
}

/// Entries of `xl/sharedStrings.xml`, rich-text runs concatenated.
fn shared_strings(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                current.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Rows of one worksheet, cells separated by tabs.
fn sheet_rows(xml: &str, shared: &[String]) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_type: Option<String> = None;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell_type = attribute(&e, b"t");
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let cell = match cell_type.as_deref() {
                        Some("s") => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i).cloned())
                            .unwrap_or_default(),
                        _ => value.clone(),
                    };
                    row.push(cell.trim().to_string());
                }
                b"row" => {
                    if row.iter().any(|c| !c.is_empty()) {
                        rows.push(row.join("\t").trim_end().to_string());
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_value => {
                value.push_str(&e.unescape().map_err(|e| e.to_string())?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows.join("\n"))
}

/// Excel workbooks, one section per worksheet.
pub struct XlsxParser;

impl DocumentParser for XlsxParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let mut archive = open(path)?;
        let shared = match read_part(&mut archive, "xl/sharedStrings.xml", path)? {
            Some(xml) => shared_strings(&xml).map_err(|e| IngestError::parse(path, e))?,
            None => Vec::new(),
        };

        let sheets = numbered_parts(&archive, "xl/worksheets/sheet", ".xml");
        let mut sections = Vec::with_capacity(sheets.len());
        for (_, name) in sheets {
            let Some(xml) = read_part(&mut archive, &name, path)? else {
                continue;
            };
            let text = sheet_rows(&xml, &shared).map_err(|e| IngestError::parse(path, e))?;
            sections.push(Section { text, page: None });
        }

        let metadata = serde_json::json!({
            "format": "xlsx",
            "sheets": sections.len(),
        });
        let doc = ParsedDocument::from_sections(sections).with_metadata(metadata);
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["xlsx"]
    }
}

/// Resolve `href` against the directory of the package document.
fn resolve_href(opf_path: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let mut parts: Vec<&str> = match opf_path.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// The package document path named by `META-INF/container.xml`.
fn rootfile(container: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(container);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                return Ok(attribute(&e, b"full-path"));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
}

/// Chapter hrefs in spine order.
fn spine(opf: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(opf);
    let mut buf = Vec::new();
    let mut manifest: HashMap<String, String> = HashMap::new();
    let mut order = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    if let (Some(id), Some(href)) = (attribute(&e, b"id"), attribute(&e, b"href")) {
                        manifest.insert(id, href);
                    }
                }
                b"itemref" => {
                    if let Some(idref) = attribute(&e, b"idref") {
                        order.push(idref);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    Ok(order
        .into_iter()
        .filter_map(|id| manifest.get(&id).cloned())
        .collect())
}

/// EPUB books, one section per spine chapter.
pub struct EpubParser;

impl DocumentParser for EpubParser {
    fn parse(&self, path: &Path) -> IngestResult<ParsedDocument> {
        let mut archive = open(path)?;
        let container = read_part(&mut archive, "META-INF/container.xml", path)?
            .ok_or_else(|| IngestError::parse(path, "missing META-INF/container.xml"))?;
        let opf_path = rootfile(&container)
            .map_err(|e| IngestError::parse(path, e))?
            .ok_or_else(|| IngestError::parse(path, "container.xml names no rootfile"))?;
        let opf = read_part(&mut archive, &opf_path, path)?
            .ok_or_else(|| IngestError::parse(path, format!("missing {}", opf_path)))?;
        let chapters = spine(&opf).map_err(|e| IngestError::parse(path, e))?;

        let mut sections = Vec::with_capacity(chapters.len());
        for href in chapters {
            let name = resolve_href(&opf_path, &href);
            if let Some(xhtml) = read_part(&mut archive, &name, path)? {
                sections.push(Section {
                    text: html_to_text(&xhtml),
                    page: None,
                });
            }
        }

        let metadata = serde_json::json!({
            "format": "epub",
            "chapters": sections.len(),
        });
        let doc = ParsedDocument::from_sections(sections).with_metadata(metadata);
        Ok(match stem_title(path) {
            Some(title) => doc.with_title(title),
            None => doc,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["epub"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(suffix: &str, parts: &[(&str, &str)]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::with_suffix(suffix).unwrap();
        let mut zip = zip::ZipWriter::new(file.reopen().unwrap());
        for (name, content) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        file
    }

    #[test]
    fn test_docx_paragraphs() {
        let file = write_zip(
            ".docx",
            &[(
                "word/document.xml",
                r#"<w:document><w:body>
                <w:p><w:r><w:t>Binary </w:t></w:r><w:r><w:t>search</w:t></w:r></w:p>
                <w:p><w:r><w:t>halves the range &amp; repeats.</w:t></w:r></w:p>
                </w:body></w:document>"#,
            )],
        );

        let doc = DocxParser.parse(file.path()).unwrap();
        assert_eq!(doc.content(), "Binary search\nhalves the range & repeats.");
    }

    #[test]
    fn test_pptx_slides_in_order() {
        let slide = |text: &str| format!("<p:sld><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>", text);
        let ten = slide("Ten");
        let two = slide("Two");
        let file = write_zip(
            ".pptx",
            &[
                ("ppt/slides/slide10.xml", ten.as_str()),
                ("ppt/slides/slide2.xml", two.as_str()),
                ("ppt/slides/_rels/slide2.xml.rels", "<Relationships/>"),
            ],
        );

        let doc = PptxParser.parse(file.path()).unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0], Section { text: "Two".into(), page: Some(2) });
        assert_eq!(doc.sections[1], Section { text: "Ten".into(), page: Some(10) });
    }

    #[test]
    fn test_xlsx_rows() {
        let file = write_zip(
            ".xlsx",
            &[
                (
                    "xl/sharedStrings.xml",
                    r#"<sst><si><t>Topic</t></si><si><r><t>Hash</t></r><r><t>maps</t></r></si></sst>"#,
                ),
                (
                    "xl/worksheets/sheet1.xml",
                    r#"<worksheet><sheetData>
                    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Week</t></is></c></row>
                    <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>5</v></c></row>
                    </sheetData></worksheet>"#,
                ),
            ],
        );

        let doc = XlsxParser.parse(file.path()).unwrap();
        assert_eq!(doc.content(), "Topic\tWeek\nHashmaps\t5");
    }

    #[test]
    fn test_epub_spine_order() {
        let file = write_zip(
            ".epub",
            &[
                (
                    "META-INF/container.xml",
                    r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#,
                ),
                (
                    "OEBPS/content.opf",
                    r#"<package><manifest>
                    <item id="c1" href="text/one.xhtml"/><item id="c2" href="text/two.xhtml"/>
                    </manifest><spine><itemref idref="c2"/><itemref idref="c1"/></spine></package>"#,
                ),
                ("OEBPS/text/one.xhtml", "<html><body><p>First chapter</p></body></html>"),
                ("OEBPS/text/two.xhtml", "<html><body><p>Second chapter</p></body></html>"),
            ],
        );

        let doc = EpubParser.parse(file.path()).unwrap();
        assert_eq!(doc.content(), "Second chapter\n\nFirst chapter");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS/content.opf", "text/a.xhtml#s1"), "OEBPS/text/a.xhtml");
        assert_eq!(resolve_href("OEBPS/content.opf", "../a.xhtml"), "a.xhtml");
        assert_eq!(resolve_href("content.opf", "a.xhtml"), "a.xhtml");
    }

    #[test]
    fn test_not_a_zip() {
        let mut file = tempfile::NamedTempFile::with_suffix(".docx").unwrap();
        file.write_all(b"plain text").unwrap();
        assert!(matches!(DocxParser.parse(file.path()), Err(IngestError::ParseError { .. })));
    }
}

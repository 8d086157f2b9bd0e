//! PDF image extraction and page rendering using Poppler.

use crate::error::ProcessResult;
use crate::tool::{require, require_file, run};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// An image taken from a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfImage {
    pub path: PathBuf,
    /// 1-based page number.
    pub page: u32,
    /// Position of the image on its page, 0 for rendered pages.
    pub index: u32,
}

fn pdf_stem(pdf_path: &Path) -> &str {
    pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
}

/// Split `"<prefix>-<a>-<b>.png"` style names into their numeric fields.
fn numeric_suffix(file_name: &str, prefix: &str) -> Option<Vec<u32>> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('-')?;
    let rest = rest.rsplit_once('.').map(|(base, _)| base).unwrap_or(rest);
    rest.split('-').map(|part| part.parse().ok()).collect()
}

/// Collect tool outputs named `<prefix>-...` and move them to their final names.
///
/// `key` maps the numeric fields of a name to `(page, order)`. Images are
/// renumbered by their order within each page before `name` is asked for
/// the final file name.
fn collect<K, N>(output_dir: &Path, prefix: &str, key: K, name: N) -> ProcessResult<Vec<PdfImage>>
where
    K: Fn(&[u32]) -> Option<(u32, u32)>,
    N: Fn(u32, u32) -> String,
{
    let mut found = Vec::new();
    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((page, order)) = numeric_suffix(&file_name, prefix).and_then(|fields| key(&fields)) else {
            continue;
        };
        found.push((page, order, entry.path()));
    }
    found.sort();

    let mut images: Vec<PdfImage> = Vec::with_capacity(found.len());
    for (page, _, raw) in found {
        let index = match images.last() {
            Some(last) if last.page == page => last.index + 1,
            _ => 0,
        };
        let path = output_dir.join(name(page, index));
        std::fs::rename(raw, &path)?;
        images.push(PdfImage { path, page, index });
    }
    Ok(images)
}

/// Extract the images embedded in a PDF's pages.
///
/// Outputs are named `<stem>_page_<page>_img_<index>.png`.
pub fn extract_pdf_images(pdf_path: &Path, output_dir: &Path) -> ProcessResult<Vec<PdfImage>> {
    require_file(pdf_path)?;
    require("pdfimages")?;

    let stem = pdf_stem(pdf_path);
    let prefix = format!("{}.raw", stem);

    info!("Extracting embedded images from {:?}", pdf_path);

    run(
        "pdfimages",
        Command::new("pdfimages")
            .args(["-png", "-p"])
            .arg(pdf_path)
            .arg(output_dir.join(&prefix)),
    )?;

    // With -p the names carry the page and a counter that runs across the document.
    let images = collect(
        output_dir,
        &prefix,
        |fields| match fields {
            [page, counter] => Some((*page, *counter)),
            _ => None,
        },
        |page, index| format!("{}_page_{}_img_{}.png", stem, page, index),
    )?;

    debug!("Extracted {} images from {:?}", images.len(), pdf_path);
    Ok(images)
}

/// Render every page of a PDF to a PNG at `dpi`.
///
/// Outputs are named `<stem>_page_<page>.png`.
pub fn render_pdf_pages(pdf_path: &Path, output_dir: &Path, dpi: u32) -> ProcessResult<Vec<PdfImage>> {
    require_file(pdf_path)?;
    require("pdftoppm")?;

    let stem = pdf_stem(pdf_path);
    let prefix = format!("{}.raw", stem);

    info!("Rendering pages of {:?} at {} dpi", pdf_path, dpi);

    run(
        "pdftoppm",
        Command::new("pdftoppm")
            .args(["-png", "-r", &dpi.to_string()])
            .arg(pdf_path)
            .arg(output_dir.join(&prefix)),
    )?;

    let pages = collect(
        output_dir,
        &prefix,
        |fields| match fields {
            [page] => Some((*page, 0)),
            _ => None,
        },
        |page, _| format!("{}_page_{}.png", stem, page),
    )?;

    debug!("Rendered {} pages from {:?}", pages.len(), pdf_path);
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(
            numeric_suffix("notes.raw-003-001.png", "notes.raw"),
            Some(vec![3, 1])
        );
        assert_eq!(numeric_suffix("notes.raw-12.png", "notes.raw"), Some(vec![12]));
        assert_eq!(numeric_suffix("notes.raw-x.png", "notes.raw"), None);
        assert_eq!(numeric_suffix("other-1.png", "notes.raw"), None);
    }

    #[test]
    fn test_collect_numbers_images_per_page() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "notes.raw-002-002.png",
            "notes.raw-001-001.png",
            "notes.raw-001-000.png",
            "notes.raw-003-010.png",
            "notes.raw-003-003.png",
            "unrelated.png",
        ] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let images = collect(
            dir.path(),
            "notes.raw",
            |fields| match fields {
                [page, counter] => Some((*page, *counter)),
                _ => None,
            },
            |page, index| format!("notes_page_{}_img_{}.png", page, index),
        )
        .unwrap();

        let names: Vec<String> = images
            .iter()
            .map(|i| i.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "notes_page_1_img_0.png",
                "notes_page_1_img_1.png",
                "notes_page_2_img_0.png",
                "notes_page_3_img_0.png",
                "notes_page_3_img_1.png",
            ]
        );
        assert_eq!(images[2].page, 2);
        assert_eq!(images[2].index, 0);
        assert_eq!(
            std::fs::read_to_string(&images[4].path).unwrap(),
            "notes.raw-003-010.png"
        );
        assert!(dir.path().join("unrelated.png").exists());
        assert!(!dir.path().join("notes.raw-002-002.png").exists());
    }

    #[test]
    fn test_missing_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_pdf_images(Path::new("/nonexistent/notes.pdf"), dir.path());
        assert!(matches!(result, Err(ProcessError::FileNotFound(_))));
    }
}

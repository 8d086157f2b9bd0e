//! Ingest command implementation.

use super::{format_size, get_database, get_paths};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use lectern_config::Config;
use lectern_core::{BatchContext, MediaKind};
use lectern_ingest::{BatchOutcome, FileFailure, FileState, IngestError, Pipeline, Providers, UploadedFile};
use std::path::{Path, PathBuf};

/// Flags of `lectern ingest`.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub subject: Option<String>,
    pub course: Option<String>,
    pub dry_run: bool,
    pub store: bool,
    pub json: bool,
}

impl IngestOptions {
    fn context(&self) -> BatchContext {
        BatchContext {
            subject: self.subject.clone(),
            course: self.course.clone(),
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn classify(path: &Path) -> MediaKind {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    MediaKind::classify(name, None)
}

/// Expand the given paths into the files of one batch.
///
/// Files named explicitly are always kept so unsupported ones show up in the
/// failure report. Directories contribute only supported, non-hidden files.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if !path.exists() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }
        if path.is_file() {
            files.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = walkdir::WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.into_path())
            .filter(|p| classify(p) != MediaKind::Unsupported)
            .collect();
        found.sort();
        files.extend(found);
    }

    files.dedup();
    Ok(files)
}

pub fn run(paths: &[PathBuf], options: IngestOptions) -> Result<()> {
    let files = collect_files(paths)?;

    if files.is_empty() {
        println!("{}", "No supported files found.".yellow());
        return Ok(());
    }

    if options.dry_run {
        println!("Found {} files", files.len());
        for path in &files {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            println!("  {} [{}] {}", path.display(), classify(path), format_size(size).dimmed());
        }
        println!("\n{}", "Dry run - no files were ingested.".cyan());
        return Ok(());
    }

    let app_paths = get_paths()?;
    let config = Config::load_from(&app_paths.config_file).context("Failed to load config")?;
    let db = if options.store { Some(get_database()?) } else { None };

    let uploads = files
        .iter()
        .map(|path| UploadedFile::read(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let providers = Providers::from_config(&config).context("Failed to set up providers")?;
    let scratch_root = config.scratch_root(&app_paths);
    let pipeline = Pipeline::new(config, scratch_root, providers);
    let context = options.context();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Ingesting {} files", uploads.len()));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        match &db {
            Some(db) => pipeline.ingest_into(uploads, &context, db).await,
            None => pipeline.ingest(uploads, &context).await,
        }
    });
    pb.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(IngestError::NothingIngested { failures }) => {
            print_failures(&failures);
            anyhow::bail!("No file in the batch could be ingested");
        }
        Err(e) => return Err(e.into()),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome, options.store);
    }

    Ok(())
}

fn print_outcome(outcome: &BatchOutcome, stored: bool) {
    println!("{} {}", "Batch".cyan().bold(), outcome.batch_id.dimmed());
    for file in &outcome.files {
        let marker = match file.state {
            FileState::Done => "✓".green(),
            _ => "✗".red(),
        };
        println!(
            "  {} {} [{}] {} units",
            marker,
            file.source.name,
            file.kind,
            file.units
        );
    }

    print_failures(&outcome.failures);

    let elapsed = outcome.finished_at - outcome.started_at;
    println!();
    println!(
        "{} {} units from {} files in {:.1}s",
        if stored { "Stored:" } else { "Produced:" }.green().bold(),
        outcome.units.len(),
        outcome.succeeded().count(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    let failed = outcome.files.iter().filter(|f| f.state == FileState::Failed).count();
    if failed > 0 {
        println!("{} {} files", "Failed:".red().bold(), failed);
    }
}

fn print_failures(failures: &[FileFailure]) {
    if failures.is_empty() {
        return;
    }
    println!();
    println!("{}", "Failures".white().bold());
    for failure in failures {
        let path = failure
            .path
            .map(|p| format!(" ({})", p.as_str()))
            .unwrap_or_default();
        println!(
            "  {} {}{} [{}] {}",
            "✗".red(),
            failure.file_name,
            path,
            failure.kind,
            failure.message.dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("week1")).unwrap();
        std::fs::create_dir_all(root.join(".cache")).unwrap();
        std::fs::write(root.join("week1/notes.md"), "# Notes").unwrap();
        std::fs::write(root.join("week1/slides.pdf"), b"%PDF").unwrap();
        std::fs::write(root.join("week1/archive.bin"), b"\0").unwrap();
        std::fs::write(root.join(".cache/hidden.md"), "x").unwrap();
        std::fs::write(root.join(".secret.txt"), "x").unwrap();

        let files = collect_files(&[root.to_path_buf()]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["week1/notes.md", "week1/slides.pdf"]);
    }

    #[test]
    fn test_explicit_files_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("archive.bin");
        std::fs::write(&file, b"\0").unwrap();

        let files = collect_files(&[file.clone(), file.clone()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_missing_path() {
        let result = collect_files(&[PathBuf::from("/nonexistent/lecture.pdf")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_batch_context() {
        let options = IngestOptions {
            subject: Some("Programming".into()),
            ..Default::default()
        };
        let ctx = options.context();
        assert_eq!(ctx.subject.as_deref(), Some("Programming"));
        assert!(ctx.course.is_none());
    }
}

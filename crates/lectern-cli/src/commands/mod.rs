//! CLI command implementations.

pub mod check;
pub mod config;
pub mod ingest;
pub mod init;
pub mod units;

use anyhow::{Context, Result};
use lectern_config::AppPaths;
use lectern_core::SourceId;
use lectern_db::Database;

/// Get the application paths.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// Get a database connection, ensuring lectern is initialized.
pub fn get_database() -> Result<Database> {
    let paths = get_paths()?;

    if !paths.is_initialized() {
        anyhow::bail!("Lectern is not initialized. Run 'lectern init' first.");
    }

    Database::open(&paths.database_file).context("Failed to open database")
}

/// Parse a source id given on the command line.
pub fn parse_source_id(raw: &str) -> Result<SourceId> {
    SourceId::parse(raw).with_context(|| format!("Invalid source id: {:?}", raw))
}

/// Format a file size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Shorten `text` to at most `max` characters for display.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

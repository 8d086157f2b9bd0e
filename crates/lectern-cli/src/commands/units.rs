//! Stored unit commands.

use super::{get_database, parse_source_id, preview};
use anyhow::Result;
use colored::Colorize;
use lectern_core::ContentUnit;

/// The first eight bytes of a unit id, or the whole id when they do not end on a char boundary.
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn locator(unit: &ContentUnit) -> String {
    let mut parts = Vec::new();
    if let Some(page) = unit.page {
        parts.push(format!("page {}", page));
    }
    if let (Some(frame), Some(ts)) = (unit.frame, unit.timestamp) {
        parts.push(format!("frame {} @ {:.1}s", frame, ts));
    }
    if let Some(index) = unit.chunk_index {
        parts.push(format!("chunk {}", index));
    }
    if let Some(image) = &unit.image_ref {
        parts.push(image.clone());
    }
    parts.join(", ")
}

pub fn list(source_id: &str, json: bool) -> Result<()> {
    let source_id = parse_source_id(source_id)?;
    let db = get_database()?;
    let units = db.units_by_source(&source_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&units)?);
        return Ok(());
    }

    if units.is_empty() {
        println!("{} No units for source {}", "Note:".yellow().bold(), source_id);
        return Ok(());
    }

    let name = &units[0].source_name;
    println!("{} {} ({})", "Source".cyan().bold(), name, source_id);
    println!("{}", "─".repeat(50));

    for unit in &units {
        println!(
            "  {} [{}] {}",
            short_id(&unit.id).dimmed(),
            unit.media_format,
            locator(unit)
        );
        println!("    {}", preview(&unit.text, 100));
    }

    println!();
    println!("{} units", units.len());
    Ok(())
}

pub fn delete(source_id: &str) -> Result<()> {
    let source_id = parse_source_id(source_id)?;
    let db = get_database()?;
    let deleted = db.delete_units_by_source(&source_id)?;

    if deleted == 0 {
        println!("{} No units for source {}", "Note:".yellow().bold(), source_id);
    } else {
        println!("{} Deleted {} units of source {}", "✓".green(), deleted, source_id);
    }
    Ok(())
}

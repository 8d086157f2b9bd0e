//! Initialize Lectern.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use lectern_config::Config;
use lectern_db::Database;

pub fn run() -> Result<()> {
    let paths = get_paths()?;

    if paths.is_initialized() {
        println!("{} Lectern is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing Lectern...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    if !paths.config_file.exists() {
        Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
    }
    println!("  {} Config: {}", "✓".green(), paths.config_file.display());

    let _db = Database::open(&paths.database_file).context("Failed to initialize database")?;
    println!("  {} Database: {}", "✓".green(), paths.database_file.display());

    println!();
    println!("{}", "Lectern initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Export provider keys: {}", "OPENAI_API_KEY, GEMINI_API_KEY".cyan());
    println!("  2. Check local tools: {}", "lectern check".cyan());
    println!(
        "  3. Ingest a lecture: {}",
        "lectern ingest 42-lecture.pdf --subject Programming".cyan()
    );

    Ok(())
}

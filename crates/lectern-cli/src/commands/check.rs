//! Check command - report local tools, provider keys and database health.

use super::get_paths;
use anyhow::Result;
use colored::Colorize;
use lectern_config::{Config, VisionKind};
use lectern_db::Database;

pub fn run() -> Result<()> {
    let paths = get_paths()?;
    let config = Config::load_from(&paths.config_file)?;

    println!("{}", "Lectern Check".cyan().bold());
    println!("{}", "─".repeat(50));

    println!();
    println!("{}", "External Tools".white().bold());
    for (tool, available) in lectern_process::check_dependencies() {
        if available {
            println!("  {} {}", "✓".green(), tool);
        } else {
            println!("  {} {} {}", "✗".red(), tool, "(not found)".dimmed());
        }
    }

    println!();
    println!("{}", "Provider Keys".white().bold());
    let providers = &config.providers;
    let mut keys = vec![("transcription", Some(providers.transcription.api_key_env.as_str()))];
    for (label, vision) in [
        ("primary vision", &providers.primary_vision),
        ("secondary vision", &providers.secondary_vision),
    ] {
        // Ollama runs locally without a key.
        let env = match vision.kind {
            VisionKind::Ollama => None,
            _ => vision.api_key_env.as_deref(),
        };
        keys.push((label, env));
    }
    for (label, env) in keys {
        match env {
            Some(env) if std::env::var(env).map(|v| !v.is_empty()).unwrap_or(false) => {
                println!("  {} {} ({})", "✓".green(), label, env)
            }
            Some(env) => println!("  {} {} ({} not set)", "✗".red(), label, env),
            None => println!("  {} {} (no key needed)", "✓".green(), label),
        }
    }

    println!();
    println!("{}", "Database".white().bold());
    if !paths.is_initialized() {
        println!("  {} Not initialized. Run 'lectern init'.", "○".yellow());
        return Ok(());
    }

    let db = Database::open(&paths.database_file)?;
    if db.integrity_check()? {
        println!("  {} Integrity OK", "✓".green());
    } else {
        println!("  {} Integrity check failed", "✗".red());
    }
    println!("  Units: {}", db.count_units(None)?);
    println!("  Path: {}", paths.database_file.display().to_string().dimmed());

    Ok(())
}

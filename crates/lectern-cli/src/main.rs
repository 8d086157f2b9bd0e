//! Lectern CLI - turn lectures, slides and documents into content units.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "lectern")]
#[command(author, version, about = "Multimodal ingestion for course material", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize lectern (create config and database)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Check external tools and the database
    Check,

    /// Ingest files or directories as one batch
    Ingest {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Subject attached to every unit
        #[arg(short, long)]
        subject: Option<String>,

        /// Course attached to every unit
        #[arg(short, long)]
        course: Option<String>,

        /// Show what would be ingested without processing
        #[arg(long)]
        dry_run: bool,

        /// Do not write units to the database
        #[arg(long)]
        no_store: bool,

        /// Print the batch outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every unit of a source file
    Delete {
        /// Source id (e.g. 42 or sha256:...)
        source_id: String,
    },

    /// List the stored units of a source file
    Units {
        /// Source id (e.g. 42 or sha256:...)
        source_id: String,

        /// Print units as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., captioning.quota_limit)
        key: String,

        /// Value to set
        value: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lectern=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lectern=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Set { key, value } => commands::config::set(&key, &value),
        },
        Commands::Check => commands::check::run(),
        Commands::Ingest {
            paths,
            subject,
            course,
            dry_run,
            no_store,
            json,
        } => commands::ingest::run(
            &paths,
            commands::ingest::IngestOptions {
                subject,
                course,
                dry_run,
                store: !no_store,
                json,
            },
        ),
        Commands::Delete { source_id } => commands::units::delete(&source_id),
        Commands::Units { source_id, json } => commands::units::list(&source_id, json),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

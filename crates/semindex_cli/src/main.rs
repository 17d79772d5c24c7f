//! SemIndex CLI
//!
//! Command-line tools for SemIndex metadata maintenance.
//!
//! # Commands
//!
//! - `inspect` - List the index records of a metadata directory
//! - `show` - Print one index record
//! - `remove` - Delete an index record (its core is left in place)
//! - `demo` - Run the index lifecycle against in-memory collaborators

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SemIndex command-line tools.
#[derive(Parser)]
#[command(name = "semindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the metadata directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every index record
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one index record
    Show {
        /// Index id
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete an index record (offline cleanup of a stuck index)
    ///
    /// Only the metadata record is deleted. The index core stays with the
    /// core manager and must be deleted there; until then, creating an index
    /// with the same name fails because the core already exists.
    Remove {
        /// Index id
        id: String,
    },

    /// Create, feed, reconfigure and reindex an index in memory
    Demo {
        /// Number of documents to feed
        #[arg(short, long, default_value = "25")]
        documents: usize,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Metadata path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Show { id, format } => {
            let path = cli.path.ok_or("Metadata path required for show")?;
            commands::show::run(&path, &id, &format)?;
        }
        Commands::Remove { id } => {
            let path = cli.path.ok_or("Metadata path required for remove")?;
            commands::remove::run(&path, &id)?;
        }
        Commands::Demo { documents } => {
            commands::demo::run(cli.path.as_deref(), documents)?;
        }
        Commands::Version => {
            println!("SemIndex CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("SemIndex Core v{}", semindex_core::VERSION);
        }
    }

    Ok(())
}

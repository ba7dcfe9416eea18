//! Commitlog CLI
//!
//! Offline tools for a commit log directory.
//!
//! # Commands
//!
//! - `inspect` - Display segments, offsets and sizes
//! - `verify` - Check that every offset is readable
//! - `produce` - Append values
//! - `consume` - Print one record
//! - `dump` - Print a range of records
//! - `truncate` - Remove old segments

mod commands;

use clap::{Parser, Subcommand};
use commands::LogOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Commit log command-line tools.
#[derive(Parser)]
#[command(name = "commitlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Store size at which a segment is sealed
    #[arg(global = true, long)]
    max_store_bytes: Option<u64>,

    /// Index size at which a segment is sealed
    #[arg(global = true, long)]
    max_index_bytes: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display segments, offsets and sizes
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that every record is readable and store and index agree
    Verify,

    /// Append values to the log
    Produce {
        /// Values to append, one record each
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Print the record at an offset
    Consume {
        /// Offset to read
        #[arg(short, long)]
        offset: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print records
    Dump {
        /// Start from this offset (default: lowest retained)
        #[arg(short, long)]
        offset: Option<u64>,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove segments whose records are all at or below an offset
    Truncate {
        /// Highest offset that may be removed
        #[arg(short, long)]
        lowest: u64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let options = LogOptions {
        max_store_bytes: cli.max_store_bytes,
        max_index_bytes: cli.max_index_bytes,
    };

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, &options, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path, &options)?;
        }
        Commands::Produce { values } => {
            let path = cli.path.ok_or("Log path required for produce")?;
            commands::produce::run(&path, &options, &values)?;
        }
        Commands::Consume { offset, format } => {
            let path = cli.path.ok_or("Log path required for consume")?;
            commands::consume::run(&path, &options, offset, &format)?;
        }
        Commands::Dump {
            offset,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            commands::dump::run(&path, &options, offset, limit, &format)?;
        }
        Commands::Truncate { lowest } => {
            let path = cli.path.ok_or("Log path required for truncate")?;
            commands::truncate::run(&path, &options, lowest)?;
        }
        Commands::Version => {
            println!("commitlog CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

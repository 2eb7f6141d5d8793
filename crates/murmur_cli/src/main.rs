//! murmur CLI
//!
//! Maintenance tools for a murmur node's local replica.
//!
//! # Commands
//!
//! - `keygen` - Generate a new identity key pair
//! - `inspect` - Display replica statistics
//! - `verify` - Re-verify every stored signature
//! - `sweep` - Remove expired notifications
//! - `purge` - Delete everything attributable to one identity

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// murmur command-line replica tools.
#[derive(Parser)]
#[command(name = "murmur")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the replica journal file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// How command results are printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new identity key pair
    Keygen,

    /// Display replica statistics
    Inspect {
        /// Also list the most popular posts
        #[arg(long)]
        popular: Option<usize>,
    },

    /// Re-verify every stored signature
    Verify,

    /// Remove expired notifications
    Sweep,

    /// Delete everything attributable to one identity
    Purge {
        /// Public key of the identity, as hex
        #[arg(short, long)]
        author: String,
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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Keygen => {
            commands::keygen::run(cli.format)?;
        }
        Commands::Inspect { popular } => {
            let path = cli.path.ok_or("Replica path required for inspect")?;
            commands::inspect::run(&path, popular, cli.format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Replica path required for verify")?;
            commands::verify::run(&path, cli.format)?;
        }
        Commands::Sweep => {
            let path = cli.path.ok_or("Replica path required for sweep")?;
            commands::sweep::run(&path, cli.format)?;
        }
        Commands::Purge { author } => {
            let path = cli.path.ok_or("Replica path required for purge")?;
            commands::purge::run(&path, &author, cli.format)?;
        }
        Commands::Version => {
            println!("murmur CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

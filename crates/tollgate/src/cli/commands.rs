//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tollgate - inspect provider rate limits and circuit breakers
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "Inspect provider rate limits, usage and circuit breakers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Load limits from this file instead of the layered configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration of every provider as JSON
    Config,

    /// Print the status snapshot of every configured provider as JSON
    Status,

    /// Show the cause a provider's classifier assigns to an error message
    Classify {
        /// Error message returned by the provider
        message: String,

        /// Provider whose classifier to use (default: substring heuristics)
        #[arg(long)]
        provider: Option<String>,
    },
}

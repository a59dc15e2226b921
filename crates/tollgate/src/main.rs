//! Tollgate CLI binary.
//!
//! This binary provides operator access to Tollgate's configuration:
//! - Print effective provider limits
//! - Print provider status snapshots
//! - Classify provider error messages

use clap::Parser;
use tollgate::ProviderRegistry;
use tollgate::cli::{
    Cli, Commands, load_config, render_classification, render_config, render_status,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    // Execute the requested command
    match cli.command {
        Commands::Config => {
            config.validate()?;
            println!("{}", render_config(&config)?);
        }

        Commands::Status => {
            let registry = ProviderRegistry::from_config(config)?;
            println!("{}", render_status(&registry)?);
        }

        Commands::Classify { message, provider } => {
            let registry = ProviderRegistry::from_config(config)?;
            println!(
                "{}",
                render_classification(&registry, provider.as_deref(), &message)
            );
        }
    }

    Ok(())
}

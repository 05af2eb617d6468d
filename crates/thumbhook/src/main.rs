//! Thumbhook CLI - ThumbHash placeholders for uploaded images.
//!
//! Computes a compact perceptual hash for each uploaded image and stores it
//! on the asset's record, so clients can show a blurred preview while the
//! full image loads.
//!
//! # Usage
//!
//! ```bash
//! # Hash a local file
//! thumbhook hash photo.jpg
//!
//! # Decode a stored hash
//! thumbhook inspect 1QcSHQRnh493V4dIh4eXh1h4kJUI
//!
//! # Process upload events against Directus
//! thumbhook run events.jsonl
//!
//! # View configuration
//! thumbhook config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Thumbhook - ThumbHash placeholders for uploaded images.
#[derive(Parser, Debug)]
#[command(name = "thumbhook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the thumbhash of a local image file
    Hash(cli::hash::HashArgs),

    /// Decode a base64 thumbhash into its average colour and aspect ratio
    Inspect(cli::inspect::InspectArgs),

    /// Process upload events and write hashes back to Directus
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match thumbhook_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `thumbhook config path`."
            );
            thumbhook_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Thumbhook v{}", thumbhook_core::VERSION);

    match cli.command {
        Commands::Hash(args) => cli::hash::execute(args, config).await,
        Commands::Inspect(args) => cli::inspect::execute(args),
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}

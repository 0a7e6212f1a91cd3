//! wdtag CLI - tag images with WD tagger ONNX models.
//!
//! # Usage
//!
//! ```bash
//! # Tag a single image
//! wdtag tag image.png
//!
//! # Tag a directory, write JSONL and caption sidecars
//! wdtag tag ./dataset/ -o tags.jsonl -f jsonl --sidecar
//!
//! # View configuration
//! wdtag config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// wdtag - anime-style image tagging with WD tagger models.
#[derive(Parser, Debug)]
#[command(name = "wdtag")]
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

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tag images and write scored tags as JSON
    Tag(cli::tag::TagArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging is not up yet, so config problems go straight to stderr.
    let config = match wdtag_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `wdtag config path`."
            );
            wdtag_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("wdtag v{}", wdtag_core::VERSION);

    match cli.command {
        Commands::Tag(args) => cli::tag::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}

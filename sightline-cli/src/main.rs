//! Sightline CLI
//!
//! Pick a desktop window from its thumbnail and record its stream.
//!
//! # Usage
//!
//! ```bash
//! # List windows that can be captured
//! sightline list-sources
//!
//! # Record the first window
//! sightline record
//!
//! # Wait for a pick, then choose from another terminal
//! sightline record --mode manual
//! sightline select window:2
//!
//! # Run the room relay
//! sightline serve --bind 127.0.0.1:8181
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Sightline - desktop window capture and room relay
#[derive(Parser)]
#[command(name = "sightline")]
#[command(version)]
#[command(about = "Desktop window capture with thumbnail picking and a room relay", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to ~/.config/sightline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capturable sources
    #[command(alias = "ls")]
    ListSources,

    /// Select a source and record it until stopped
    Record(commands::RecordArgs),

    /// Pick the source a manual-mode session should record
    Select(commands::SelectArgs),

    /// Stop the running session
    Stop,

    /// Show status of the running session
    Status,

    /// Run the room relay server
    Serve(commands::ServeArgs),

    /// Manage configuration
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("sightline_core={}", level).parse()?)
        .add_directive(format!("sightline={}", level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::ListSources => commands::list_sources(config).await?,
        Commands::Record(args) => commands::record(config, args).await?,
        Commands::Select(args) => commands::select(args).await?,
        Commands::Stop => commands::stop().await?,
        Commands::Status => commands::status().await?,
        Commands::Serve(args) => commands::serve(config, args).await?,
        Commands::Config(args) => commands::config(config, args).await?,
    }

    Ok(())
}

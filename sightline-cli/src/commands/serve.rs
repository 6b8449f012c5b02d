//! Serve command - run the room relay

use anyhow::{Context, Result};
use clap::Args;
use sightline_core::server::{self, RoomRegistry};
use std::net::SocketAddr;
use std::path::Path;
use tokio::signal;
use tracing::error;

use super::load_config;

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (e.g. 127.0.0.1:8181)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Route prefix (default /api/v1)
    #[arg(short, long)]
    prefix: Option<String>,
}

/// Run the relay until Ctrl+C
pub async fn serve(config_path: Option<&Path>, args: ServeArgs) -> Result<()> {
    let file = load_config(config_path)?;
    let mut config = file.server_config()?;

    if let Some(bind) = args.bind {
        config = config.with_bind(bind);
    }
    if let Some(prefix) = args.prefix {
        config = config.with_api_prefix(prefix);
    }
    config
        .validate_strict()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    println!("Sightline - Room Relay\n");
    println!("  Listening:  http://{}{}", config.bind, config.normalized_prefix());
    println!("  Seats:      {} per room", config.room_capacity);
    println!("  Idle stop:  {:?}", config.idle_timeout);
    println!();
    println!("Press Ctrl+C to stop...\n");

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        println!("\nReceived interrupt signal...");
    };

    server::serve(config, RoomRegistry::new(), shutdown)
        .await
        .context("Room relay failed")?;

    println!("Relay stopped.");
    Ok(())
}

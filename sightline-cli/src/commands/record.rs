//! Record command - select a source and record it

use anyhow::{bail, Context, Result};
use clap::Args;
use sightline_core::capture::SelectionMode;
use sightline_core::ipc::{daemon_running, IpcServer};
use sightline_core::{Pipeline, PipelineState};
use std::path::Path;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use super::load_config;

/// How often the foreground loop checks on the recorder
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Arguments for the record command
#[derive(Args)]
pub struct RecordArgs {
    /// Selection mode (auto, manual)
    #[arg(short, long)]
    mode: Option<String>,

    /// Seconds to wait for a manual selection (0 = wait indefinitely)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Maximum stream width
    #[arg(long)]
    max_width: Option<u32>,

    /// Maximum stream height
    #[arg(long)]
    max_height: Option<u32>,
}

/// Run one capture session in the foreground
pub async fn record(config_path: Option<&Path>, args: RecordArgs) -> Result<()> {
    println!("Sightline - Starting Capture\n");

    if daemon_running().await {
        bail!("A capture session is already running. Stop it with 'sightline stop'.");
    }

    let file = load_config(config_path)?;
    let mut capture = file.capture_config()?;

    if let Some(mode) = args.mode {
        let mode: SelectionMode = mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        capture = capture.with_selection(mode);
    }
    match args.timeout {
        Some(0) => capture.selection_timeout = None,
        Some(secs) => capture = capture.with_selection_timeout(Duration::from_secs(secs)),
        None => {}
    }
    if args.max_width.is_some() || args.max_height.is_some() {
        let max_width = args.max_width.unwrap_or(capture.max_width);
        let max_height = args.max_height.unwrap_or(capture.max_height);
        capture = capture.with_max_size(max_width, max_height);
    }

    capture
        .validate_strict()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    for warning in capture.validate() {
        warn!("{}", warning);
    }

    println!("Configuration:");
    println!("  Selection:   {}", capture.selection);
    if let Some(timeout) = capture.selection_timeout() {
        println!("  Timeout:     {}s", timeout.as_secs());
    }
    println!("  Max size:    {}x{}", capture.max_width, capture.max_height);
    println!();

    let mode = capture.selection;
    let mut pipeline = Pipeline::with_desktop(capture, file.desktop.build());

    // The IPC server answers status/select/stop while the chain runs
    let mut server = IpcServer::new(pipeline.monitor());
    server
        .start()
        .await
        .context("Failed to start IPC server")?;
    let mut shutdown_rx = server.shutdown_receiver();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("IPC server error: {}", e);
        }
    });

    if mode == SelectionMode::Manual {
        println!("Waiting for a source selection...");
        println!("List sources with 'sightline list-sources', then run 'sightline select <ID>'.\n");
    }

    let started = tokio::select! {
        result = pipeline.start() => Some(result),
        _ = signal::ctrl_c() => {
            println!("\nReceived interrupt signal...");
            None
        }
        _ = shutdown_rx.recv() => {
            println!("\nReceived stop command...");
            None
        }
    };

    match started {
        Some(Ok(session)) => {
            println!("Capture started!");
            println!("  Source:     {} ({})", session.source.name, session.source.id);
            println!("  Resolution: {}x{}", session.width, session.height);
            println!();
            println!("Press Ctrl+C or run 'sightline stop' to stop...\n");

            tokio::select! {
                _ = signal::ctrl_c() => {
                    println!("\nReceived interrupt signal...");
                }
                _ = shutdown_rx.recv() => {
                    println!("\nReceived stop command...");
                }
                _ = async {
                    while pipeline.is_running() {
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                } => {
                    info!("Media stream ended");
                }
            }
        }
        Some(Err(e)) => {
            server_task.abort();
            if let Some(hint) = e.user_hint() {
                eprintln!("Hint: {}", hint);
            }
            return Err(anyhow::Error::new(e).context("Failed to start capture"));
        }
        None => {}
    }

    println!("Stopping capture...");
    let stats = pipeline.stop().await?;
    server_task.abort();

    if pipeline.state() == PipelineState::Stopped {
        println!("Capture stopped. {}", stats);
    }

    Ok(())
}

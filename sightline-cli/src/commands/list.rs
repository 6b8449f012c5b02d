//! List sources command

use anyhow::{Context, Result};
use sightline_core::capture::SourceEnumerator;
use sightline_core::ipc::{daemon_running, IpcClient};
use sightline_core::CaptureSource;
use std::path::Path;
use std::sync::Arc;

use super::load_config;

/// List capturable sources
///
/// Asks the running session when there is one, so the ids match what
/// `sightline select` accepts.
pub async fn list_sources(config_path: Option<&Path>) -> Result<()> {
    println!("Sightline - Available Capture Sources\n");

    let sources = if daemon_running().await {
        let mut client = IpcClient::connect().await?;
        client.list_sources().await?
    } else {
        let file = load_config(config_path)?;
        let capture = file.capture_config()?;
        let desktop = file.desktop.build();

        SourceEnumerator::new(Arc::new(desktop))
            .with_thumbnail_size(capture.thumbnail_width, capture.thumbnail_height)
            .enumerate(&capture.filter())
            .await
            .context("Failed to enumerate sources")?
    };

    if sources.is_empty() {
        println!("No sources found.");
        println!("\nOnly windows whose thumbnail can be rendered are listed.");
        return Ok(());
    }

    print_sources(&sources);

    println!("\nUse 'sightline record' to capture the first source,");
    println!("or 'sightline record --mode manual' and 'sightline select <ID>' to pick one.");

    Ok(())
}

fn print_sources(sources: &[CaptureSource]) {
    println!("{:<20} {:<30} {:<10} {:<10}", "ID", "Name", "Type", "Thumbnail");
    println!("{}", "-".repeat(70));

    for source in sources {
        println!(
            "{:<20} {:<30} {:<10} {}x{}",
            source.id.as_str(),
            truncate(&source.name, 28),
            source.kind.to_string(),
            source.thumbnail.width,
            source.thumbnail.height
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

//! Status command - show the running session

use anyhow::Result;
use sightline_core::ipc::IpcClient;
use sightline_core::SightlineError;

/// Show status of the running session
pub async fn status() -> Result<()> {
    println!("Sightline - Status\n");

    let mut client = match IpcClient::connect().await {
        Ok(client) => client,
        Err(SightlineError::NoActiveSession) => {
            println!("  State: not running");
            println!();
            println!("Start a session with: sightline record");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let status = client.status().await?;

    println!("  State:      {}", status.state);
    println!("  Mode:       {}", status.mode);
    println!("  Sources:    {}", status.source_count);
    match (&status.selected, &status.source_name) {
        (Some(id), Some(name)) => println!("  Source:     {} ({})", name, id),
        (Some(id), None) => println!("  Source:     {}", id),
        _ => println!("  Source:     none selected"),
    }
    if let Some((w, h)) = status.resolution {
        println!("  Resolution: {}x{}", w, h);
    }
    println!("  PID:        {}", status.pid);
    println!("  Uptime:     {:.0}s", status.uptime_seconds);

    if status.running {
        let stats = client.stats().await?;
        println!();
        println!("  Chunks:     {}", stats.chunks);
        println!("  Bytes:      {}", stats.bytes);
        println!("  Recording:  {:.1}s", stats.elapsed_seconds);
    }

    Ok(())
}

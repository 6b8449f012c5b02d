//! Stop command - stop the running session

use anyhow::Result;
use sightline_core::ipc::IpcClient;
use sightline_core::SightlineError;

/// Stop the running session
pub async fn stop() -> Result<()> {
    let mut client = match IpcClient::connect().await {
        Ok(client) => client,
        Err(SightlineError::NoActiveSession) => {
            println!("No capture session is running.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    client.stop().await?;
    println!("Stop requested.");

    Ok(())
}

//! Select command - pick the source of a waiting session

use anyhow::Result;
use clap::Args;
use sightline_core::ipc::IpcClient;
use sightline_core::SightlineError;

/// Arguments for the select command
#[derive(Args)]
pub struct SelectArgs {
    /// Source id as shown by 'sightline list-sources'
    id: String,
}

/// Send a manual selection to the running session
pub async fn select(args: SelectArgs) -> Result<()> {
    let mut client = match IpcClient::connect().await {
        Ok(client) => client,
        Err(SightlineError::NoActiveSession) => {
            println!("No capture session is running.");
            println!("Start one with: sightline record --mode manual");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    client.select(args.id.as_str()).await?;
    println!("Selected {}.", args.id);

    Ok(())
}

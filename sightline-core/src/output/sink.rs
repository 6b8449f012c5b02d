//! Chunk sinks
//!
//! Where recorded chunks end up. The default discards them.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, SightlineError};
use crate::types::MediaChunk;

/// Consumer of recorded chunks
#[async_trait]
pub trait ChunkSink: Send {
    /// Take one chunk; an error stops the recording
    async fn deliver(&mut self, chunk: MediaChunk) -> Result<()>;

    /// Called once after the last chunk
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drops every chunk
#[derive(Debug, Default)]
pub struct DiscardSink;

#[async_trait]
impl ChunkSink for DiscardSink {
    async fn deliver(&mut self, chunk: MediaChunk) -> Result<()> {
        trace!("Discarding chunk {} ({} bytes)", chunk.sequence, chunk.len());
        Ok(())
    }
}

/// Forwards chunks to a channel receiver
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<MediaChunk>,
}

impl ChannelSink {
    /// Create a sink and the receiver that yields its chunks
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MediaChunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    async fn deliver(&mut self, chunk: MediaChunk) -> Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| SightlineError::recorder("chunk receiver dropped"))
    }
}

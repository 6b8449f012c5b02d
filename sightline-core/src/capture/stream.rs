//! Negotiated media stream
//!
//! Wraps the provider's track and guarantees it is released exactly once,
//! either explicitly or when the stream is dropped.

use bytes::Bytes;
use tracing::{debug, info};

use super::MediaTrack;
use crate::error::Result;
use crate::types::{Handle, MediaConstraints, SourceId};

/// A live video stream bound to one capture source
pub struct MediaStream {
    handle: Handle,
    constraints: MediaConstraints,
    track: Box<dyn MediaTrack>,
    released: bool,
}

impl MediaStream {
    /// Take ownership of a negotiated track
    pub fn new(constraints: MediaConstraints, track: Box<dyn MediaTrack>) -> Self {
        let handle = Handle::new();
        let (width, height) = track.dimensions();
        info!(
            "Media stream {} opened for source {} at {}x{}",
            handle,
            constraints.source_id(),
            width,
            height
        );
        Self {
            handle,
            constraints,
            track,
            released: false,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Source the stream is pinned to
    pub fn source_id(&self) -> &SourceId {
        self.constraints.source_id()
    }

    pub fn constraints(&self) -> &MediaConstraints {
        &self.constraints
    }

    /// Negotiated frame size
    pub fn dimensions(&self) -> (u32, u32) {
        self.track.dimensions()
    }

    /// Next encoded chunk; `None` at end of stream or after release
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        if self.released {
            return None;
        }
        self.track.next_chunk().await
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the underlying track
    ///
    /// Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.track.release();
        self.released = true;
        info!("Media stream {} released", self.handle);
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("handle", &self.handle)
            .field("constraints", &self.constraints)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        if !self.released {
            debug!("Media stream {} dropped without release", self.handle);
            self.release();
        }
    }
}

//! Stream acquisition
//!
//! Negotiates a video-only stream for the selected source. One request per
//! call, no retries, no constraint fallback.

use std::sync::Arc;
use tracing::{error, info};

use super::{MediaProvider, MediaStream};
use crate::error::{Result, SightlineError};
use crate::types::{MediaConstraints, SourceId};

/// Default maximum stream width
pub const DEFAULT_MAX_WIDTH: u32 = 400;

/// Default maximum stream height
pub const DEFAULT_MAX_HEIGHT: u32 = 300;

/// Requests constrained streams from a media provider
pub struct StreamAcquirer {
    provider: Arc<dyn MediaProvider>,
    max_width: u32,
    max_height: u32,
}

impl StreamAcquirer {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self {
            provider,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }

    /// Override the maximum stream size
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Constraints that `acquire` would request for `source_id`
    pub fn constraints_for(&self, source_id: &SourceId) -> MediaConstraints {
        MediaConstraints::desktop_video(source_id.clone(), self.max_width, self.max_height)
    }

    /// Negotiate a stream pinned to `source_id`
    ///
    /// Every failure is reported as an acquisition error; no stream exists
    /// afterwards.
    pub async fn acquire(&self, source_id: &SourceId) -> Result<MediaStream> {
        if source_id.is_empty() {
            return Err(SightlineError::acquisition("source id is empty"));
        }

        let constraints = self.constraints_for(source_id);
        info!(
            "Requesting stream for {} (audio: {}, max {}x{})",
            source_id, constraints.audio, self.max_width, self.max_height
        );

        match self.provider.get_user_media(&constraints).await {
            Ok(track) => Ok(MediaStream::new(constraints, track)),
            Err(e) => {
                error!("Stream negotiation for {} failed: {}", source_id, e);
                Err(match e {
                    SightlineError::Acquisition(_) => e,
                    other => SightlineError::acquisition(other.to_string()),
                })
            }
        }
    }
}

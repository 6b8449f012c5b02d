//! Source enumeration
//!
//! Turns the provider's raw source list into displayable sources. A source
//! is only displayed when its thumbnail renders; the rest are skipped.

use std::sync::Arc;
use tracing::{debug, info};

use super::DesktopCapturer;
use super::thumbnail;
use crate::error::{Result, SightlineError};
use crate::types::{CaptureSource, SourceFilter};

/// Default thumbnail bounding box
pub const DEFAULT_THUMBNAIL_SIZE: (u32, u32) = (150, 150);

/// Lists capture sources and renders their thumbnails
pub struct SourceEnumerator {
    capturer: Arc<dyn DesktopCapturer>,
    thumbnail_size: (u32, u32),
}

impl SourceEnumerator {
    pub fn new(capturer: Arc<dyn DesktopCapturer>) -> Self {
        Self {
            capturer,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }

    /// Set the thumbnail bounding box
    pub fn with_thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.thumbnail_size = (width, height);
        self
    }

    /// Enumerate sources matching `filter`
    ///
    /// Provider failures are fatal and come back as enumeration errors.
    /// Sources with an empty id, a kind outside the filter, or a
    /// thumbnail that cannot be rendered are left out.
    pub async fn enumerate(&self, filter: &SourceFilter) -> Result<Vec<CaptureSource>> {
        let raw = self
            .capturer
            .get_sources(filter)
            .await
            .map_err(|e| match e {
                SightlineError::Enumeration(_) => e,
                other => SightlineError::enumeration(other.to_string()),
            })?;

        let total = raw.len();
        let (max_w, max_h) = self.thumbnail_size;
        let mut sources = Vec::with_capacity(total);

        for source in raw {
            if source.id.is_empty() {
                debug!("Skipping source {:?} without an id", source.name);
                continue;
            }
            if !filter.allows(source.kind) {
                debug!("Skipping {} source {}", source.kind, source.id);
                continue;
            }

            let Some(snapshot) = source.thumbnail.as_ref() else {
                debug!("Skipping source {}: no thumbnail", source.id);
                continue;
            };

            let thumbnail = match thumbnail::render(snapshot, max_w, max_h) {
                Ok(t) => t,
                Err(e) => {
                    debug!("Skipping source {}: {}", source.id, e);
                    continue;
                }
            };

            sources.push(CaptureSource {
                id: source.id,
                name: source.name,
                kind: source.kind,
                thumbnail,
            });
        }

        info!(
            "Enumerated {} displayable source(s) out of {}",
            sources.len(),
            total
        );
        Ok(sources)
    }
}

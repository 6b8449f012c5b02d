//! Configuration types for Sightline
//!
//! Runtime configuration for the capture pipeline and the room relay.

mod file;

pub use file::{sample_config, CaptureSettings, ConfigFile, DesktopSettings, ServerSettings};

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::capture::SelectionMode;
use crate::capture::acquire::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH};
use crate::capture::enumerator::DEFAULT_THUMBNAIL_SIZE;
use crate::types::{SourceFilter, SourceKind};

/// Largest stream dimension accepted
const MAX_DIMENSION: u32 = 7680;

/// Capture pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Source kinds to enumerate
    #[serde(default = "default_kinds")]
    pub kinds: Vec<SourceKind>,
    /// How the source is chosen
    #[serde(default)]
    pub selection: SelectionMode,
    /// Manual selection timeout (None = wait indefinitely)
    #[serde(default)]
    pub selection_timeout: Option<Duration>,
    /// Maximum stream width
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Maximum stream height
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Thumbnail bounding box width
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
    /// Thumbnail bounding box height
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,
}

fn default_kinds() -> Vec<SourceKind> {
    vec![SourceKind::Window]
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_thumbnail_width() -> u32 {
    DEFAULT_THUMBNAIL_SIZE.0
}

fn default_thumbnail_height() -> u32 {
    DEFAULT_THUMBNAIL_SIZE.1
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
            selection: SelectionMode::AutoFirst,
            selection_timeout: None,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            thumbnail_width: DEFAULT_THUMBNAIL_SIZE.0,
            thumbnail_height: DEFAULT_THUMBNAIL_SIZE.1,
        }
    }
}

impl CaptureConfig {
    /// Config that captures the first window
    pub fn auto_first() -> Self {
        Self::default()
    }

    /// Config that waits for a manual pick
    pub fn manual() -> Self {
        Self::default().with_selection(SelectionMode::Manual)
    }

    /// Set the selection mode
    pub fn with_selection(mut self, mode: SelectionMode) -> Self {
        self.selection = mode;
        self
    }

    /// Set the manual selection timeout
    pub fn with_selection_timeout(mut self, timeout: Duration) -> Self {
        self.selection_timeout = Some(timeout);
        self
    }

    /// Set the maximum stream size
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Set the thumbnail bounding box
    pub fn with_thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.thumbnail_width = width;
        self.thumbnail_height = height;
        self
    }

    /// Set the source kinds to enumerate
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Enumeration filter
    pub fn filter(&self) -> SourceFilter {
        SourceFilter::of(self.kinds.iter().copied())
    }

    /// Manual selection timeout
    pub fn selection_timeout(&self) -> Option<Duration> {
        self.selection_timeout
    }

    /// Validate the configuration and return any warnings
    ///
    /// An empty list means the configuration looks good.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.selection == SelectionMode::Manual && self.selection_timeout.is_none() {
            warnings.push(
                "Manual selection without a timeout waits until a source is picked.".to_string(),
            );
        }

        if self.selection == SelectionMode::AutoFirst && self.selection_timeout.is_some() {
            warnings.push("Selection timeout has no effect in auto mode.".to_string());
        }

        if self.kinds.iter().any(|k| *k != SourceKind::Window) {
            warnings.push(
                "Enumerating screens or tabs in addition to windows; auto mode may pick one of them."
                    .to_string(),
            );
        }

        if self.thumbnail_width > self.max_width || self.thumbnail_height > self.max_height {
            warnings.push(format!(
                "Thumbnails ({}x{}) are larger than the stream itself ({}x{}).",
                self.thumbnail_width, self.thumbnail_height, self.max_width, self.max_height
            ));
        }

        warnings
    }

    /// Validate and return an error if configuration is invalid
    pub fn validate_strict(&self) -> Result<(), String> {
        if self.kinds.is_empty() {
            return Err("At least one source kind must be enumerated".to_string());
        }

        if self.max_width == 0 || self.max_height == 0 {
            return Err("Maximum stream size cannot be zero".to_string());
        }

        if self.max_width > MAX_DIMENSION || self.max_height > MAX_DIMENSION {
            return Err(format!(
                "Maximum stream size {}x{} exceeds supported ({}x{})",
                self.max_width, self.max_height, MAX_DIMENSION, MAX_DIMENSION
            ));
        }

        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err("Thumbnail size cannot be zero".to_string());
        }

        if self.selection_timeout.is_some_and(|t| t.is_zero()) {
            return Err("Selection timeout cannot be zero".to_string());
        }

        Ok(())
    }
}

/// Room relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Prefix for every API route
    pub api_prefix: String,
    /// Seats per room
    pub room_capacity: u32,
    /// A room with no bound seat stops after this long
    pub idle_timeout: Duration,
    /// Largest request body accepted by `room.stream`
    pub max_chunk_bytes: usize,
    /// Chunks buffered per viewer before chunks are dropped for it
    pub viewer_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8181)),
            api_prefix: "/api/v1".to_string(),
            room_capacity: 8,
            idle_timeout: Duration::from_secs(180),
            max_chunk_bytes: 8 * 1024 * 1024,
            viewer_buffer: 64,
        }
    }
}

impl ServerConfig {
    /// Set the listen address
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Set the route prefix
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the number of seats per room
    pub fn with_room_capacity(mut self, capacity: u32) -> Self {
        self.room_capacity = capacity;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Route prefix normalised to `/x` form (empty means default)
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.api_prefix.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return "/api/v1".to_string();
        }
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Validate and return an error if configuration is invalid
    pub fn validate_strict(&self) -> Result<(), String> {
        if self.room_capacity == 0 {
            return Err("Room capacity cannot be zero".to_string());
        }
        if self.idle_timeout.is_zero() {
            return Err("Idle timeout cannot be zero".to_string());
        }
        if self.max_chunk_bytes == 0 {
            return Err("Maximum chunk size cannot be zero".to_string());
        }
        if self.viewer_buffer == 0 {
            return Err("Viewer buffer cannot be zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capture_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.selection, SelectionMode::AutoFirst);
        assert_eq!((config.max_width, config.max_height), (400, 300));
        assert_eq!(config.filter(), SourceFilter::windows());
        assert!(config.validate_strict().is_ok());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_prefix_normalization() {
        let config = ServerConfig::default().with_api_prefix("api/v2/");
        assert_eq!(config.normalized_prefix(), "/api/v2");

        let config = ServerConfig::default().with_api_prefix("");
        assert_eq!(config.normalized_prefix(), "/api/v1");
    }
}

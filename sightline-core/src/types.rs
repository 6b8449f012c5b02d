//! Core types for Sightline
//!
//! These types represent the data flowing between the capture stages:
//! enumerated sources, negotiation constraints and recorded chunks.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global handle counter for unique session IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a capture session or stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Identifier of a capture source
///
/// Only meaningful within the enumeration that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// On-screen application window
    Window,
    /// Whole screen or desktop background
    Screen,
    /// Browser tab
    Tab,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Window => write!(f, "Window"),
            SourceKind::Screen => write!(f, "Screen"),
            SourceKind::Tab => write!(f, "Tab"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "window" => Ok(Self::Window),
            "screen" | "desktop" => Ok(Self::Screen),
            "tab" => Ok(Self::Tab),
            _ => Err(format!("Unknown source kind: {}", s)),
        }
    }
}

/// Which kinds of sources an enumeration should return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFilter {
    pub types: BTreeSet<SourceKind>,
}

impl SourceFilter {
    /// Application windows only
    pub fn windows() -> Self {
        Self::of([SourceKind::Window])
    }

    pub fn of(kinds: impl IntoIterator<Item = SourceKind>) -> Self {
        Self {
            types: kinds.into_iter().collect(),
        }
    }

    pub fn allows(&self, kind: SourceKind) -> bool {
        self.types.contains(&kind)
    }
}

impl Default for SourceFilter {
    fn default() -> Self {
        Self::windows()
    }
}

/// A source as reported by the desktop capture provider
#[derive(Debug, Clone)]
pub struct RawSource {
    pub id: SourceId,
    pub name: String,
    pub kind: SourceKind,
    /// Still snapshot, if the provider could take one
    pub thumbnail: Option<image::RgbaImage>,
}

impl RawSource {
    pub fn new(id: impl Into<SourceId>, name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            thumbnail: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: image::RgbaImage) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}

/// Thumbnail encoded for transport (a PNG data URI)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// A displayable capture source with a rendered thumbnail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSource {
    pub id: SourceId,
    pub name: String,
    pub kind: SourceKind,
    pub thumbnail: Thumbnail,
}

impl std::fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({})", self.id, self.name, self.kind)
    }
}

/// Video half of the negotiation constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConstraints {
    pub max_width: u32,
    pub max_height: u32,
    /// Source the stream is pinned to
    pub source_id: SourceId,
}

impl VideoConstraints {
    /// Scale a native size into the constraint box
    ///
    /// Keeps the aspect ratio and never upscales. Both sides stay >= 1.
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (0, 0);
        }
        if width <= self.max_width && height <= self.max_height {
            return (width, height);
        }

        let (w, h, max_w, max_h) = (
            width as u64,
            height as u64,
            self.max_width as u64,
            self.max_height as u64,
        );
        if w * max_h >= h * max_w {
            // Width is the limiting side
            (self.max_width, ((h * max_w) / w).max(1) as u32)
        } else {
            (((w * max_h) / h).max(1) as u32, self.max_height)
        }
    }
}

/// Constraints passed to the media provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: VideoConstraints,
}

impl MediaConstraints {
    /// Video-only desktop capture pinned to one source
    pub fn desktop_video(source_id: SourceId, max_width: u32, max_height: u32) -> Self {
        Self {
            audio: false,
            video: VideoConstraints {
                max_width,
                max_height,
                source_id,
            },
        }
    }

    pub fn source_id(&self) -> &SourceId {
        &self.video.source_id
    }
}

/// A piece of encoded media delivered by the recorder
#[derive(Debug, Clone)]
pub struct MediaChunk {
    /// Position in the recording, starting at 0
    pub sequence: u64,
    pub data: Bytes,
    /// Milliseconds since recording started
    pub timestamp_ms: u64,
}

impl MediaChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints(w: u32, h: u32) -> VideoConstraints {
        VideoConstraints {
            max_width: w,
            max_height: h,
            source_id: SourceId::new("w1"),
        }
    }

    #[test]
    fn test_fit_scales_down_keeping_aspect() {
        assert_eq!(constraints(400, 300).fit(1920, 1080), (400, 225));
        assert_eq!(constraints(400, 300).fit(1000, 1000), (300, 300));
    }

    #[test]
    fn test_fit_never_upscales() {
        assert_eq!(constraints(400, 300).fit(320, 200), (320, 200));
        assert_eq!(constraints(400, 300).fit(0, 100), (0, 0));
    }

    #[test]
    fn test_source_id_blank_is_empty() {
        assert!(SourceId::new("").is_empty());
        assert!(SourceId::new("  ").is_empty());
        assert!(!SourceId::new("w1").is_empty());
    }

    #[test]
    fn test_window_filter() {
        let filter = SourceFilter::windows();
        assert!(filter.allows(SourceKind::Window));
        assert!(!filter.allows(SourceKind::Screen));
        assert!(!filter.allows(SourceKind::Tab));
    }
}

//! Synthetic desktop backend
//!
//! A stand-in platform that implements both provider traits: it lists
//! configurable windows with solid-colour snapshots and streams raw RGBA
//! frames for them. Used by the CLI and the tests.
//!
//! Failure switches (denied permission, unrenderable thumbnails, closed
//! windows) mirror what a real platform can do to the pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

use super::{DesktopCapturer, MediaProvider, MediaTrack};
use crate::error::{Result, SightlineError};
use crate::types::{MediaConstraints, RawSource, SourceFilter, SourceId, SourceKind};

/// Default time between two chunks
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_millis(1000);

/// A window on the synthetic desktop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticWindow {
    pub id: String,
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: SourceKind,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// RGB fill used for snapshots and frames
    #[serde(default = "default_color")]
    pub color: [u8; 3],
    /// When false the snapshot is empty and cannot be rendered
    #[serde(default = "default_true")]
    pub renderable: bool,
}

fn default_kind() -> SourceKind {
    SourceKind::Window
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_color() -> [u8; 3] {
    [48, 96, 160]
}

fn default_true() -> bool {
    true
}

impl SyntheticWindow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: default_kind(),
            width: default_width(),
            height: default_height(),
            color: default_color(),
            renderable: true,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Make the snapshot fail to render
    pub fn without_thumbnail(mut self) -> Self {
        self.renderable = false;
        self
    }

    fn pixel(&self) -> Rgba<u8> {
        Rgba([self.color[0], self.color[1], self.color[2], 255])
    }

    fn snapshot(&self) -> RgbaImage {
        if !self.renderable {
            return RgbaImage::new(0, 0);
        }
        // Quarter size is plenty for a thumbnail
        let w = (self.width / 4).max(1);
        let h = (self.height / 4).max(1);
        RgbaImage::from_pixel(w, h, self.pixel())
    }
}

/// Windows shown when nothing is configured
pub fn default_windows() -> Vec<SyntheticWindow> {
    vec![
        SyntheticWindow::new("window:1", "Editor").with_color([40, 44, 52]),
        SyntheticWindow::new("window:2", "Browser")
            .with_size(1920, 1080)
            .with_color([240, 240, 240]),
    ]
}

#[derive(Debug, Clone, Copy)]
struct TrackSettings {
    chunk_interval: Duration,
    chunk_limit: Option<u64>,
}

struct Inner {
    windows: RwLock<Vec<SyntheticWindow>>,
    settings: RwLock<TrackSettings>,
    permission_denied: AtomicBool,
    active_streams: AtomicUsize,
    acquire_calls: AtomicU64,
}

/// Synthetic capture and media provider
#[derive(Clone)]
pub struct SyntheticDesktop {
    inner: Arc<Inner>,
}

impl SyntheticDesktop {
    pub fn new(windows: Vec<SyntheticWindow>) -> Self {
        Self {
            inner: Arc::new(Inner {
                windows: RwLock::new(windows),
                settings: RwLock::new(TrackSettings {
                    chunk_interval: DEFAULT_CHUNK_INTERVAL,
                    chunk_limit: None,
                }),
                permission_denied: AtomicBool::new(false),
                active_streams: AtomicUsize::new(0),
                acquire_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Time between chunks of every stream opened afterwards
    pub fn with_chunk_interval(self, interval: Duration) -> Self {
        self.inner.settings.write().chunk_interval = interval;
        self
    }

    /// End streams after `limit` chunks
    pub fn with_chunk_limit(self, limit: u64) -> Self {
        self.inner.settings.write().chunk_limit = Some(limit);
        self
    }

    /// Make enumeration and negotiation fail as if access were denied
    pub fn set_permission_denied(&self, denied: bool) {
        self.inner.permission_denied.store(denied, Ordering::SeqCst);
    }

    pub fn open_window(&self, window: SyntheticWindow) {
        self.inner.windows.write().push(window);
    }

    /// Remove a window; returns false if it was not open
    pub fn close_window(&self, id: &str) -> bool {
        let mut windows = self.inner.windows.write();
        let before = windows.len();
        windows.retain(|w| w.id != id);
        before != windows.len()
    }

    pub fn windows(&self) -> Vec<SyntheticWindow> {
        self.inner.windows.read().clone()
    }

    /// Streams negotiated and not yet released
    pub fn active_streams(&self) -> usize {
        self.inner.active_streams.load(Ordering::SeqCst)
    }

    /// Number of negotiation requests received
    pub fn acquire_calls(&self) -> u64 {
        self.inner.acquire_calls.load(Ordering::SeqCst)
    }

    fn window(&self, id: &str) -> Option<SyntheticWindow> {
        self.inner.windows.read().iter().find(|w| w.id == id).cloned()
    }
}

impl Default for SyntheticDesktop {
    fn default() -> Self {
        Self::new(default_windows())
    }
}

#[async_trait]
impl DesktopCapturer for SyntheticDesktop {
    async fn get_sources(&self, filter: &SourceFilter) -> Result<Vec<RawSource>> {
        if self.inner.permission_denied.load(Ordering::SeqCst) {
            return Err(SightlineError::enumeration(
                "screen capture permission denied",
            ));
        }

        let windows = self.inner.windows.read();
        let sources = windows
            .iter()
            .filter(|w| filter.allows(w.kind))
            .map(|w| {
                RawSource::new(w.id.as_str(), w.name.as_str(), w.kind).with_thumbnail(w.snapshot())
            })
            .collect::<Vec<_>>();

        debug!("Synthetic desktop listed {} source(s)", sources.len());
        Ok(sources)
    }
}

#[async_trait]
impl MediaProvider for SyntheticDesktop {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaTrack>> {
        self.inner.acquire_calls.fetch_add(1, Ordering::SeqCst);

        if constraints.audio {
            return Err(SightlineError::acquisition(
                "audio capture is not supported",
            ));
        }
        if self.inner.permission_denied.load(Ordering::SeqCst) {
            return Err(SightlineError::acquisition("permission denied"));
        }

        let source_id = constraints.source_id().clone();
        let window = self.window(source_id.as_str()).ok_or_else(|| {
            SightlineError::acquisition(format!("source {} is no longer available", source_id))
        })?;

        let (width, height) = constraints.video.fit(window.width, window.height);
        if width == 0 || height == 0 {
            return Err(SightlineError::acquisition(format!(
                "constraints {}x{} cannot be satisfied for {}",
                constraints.video.max_width, constraints.video.max_height, source_id
            )));
        }

        let settings = *self.inner.settings.read();
        let mut interval = tokio::time::interval(settings.chunk_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.inner.active_streams.fetch_add(1, Ordering::SeqCst);
        info!(
            "Synthetic stream negotiated for {} at {}x{}",
            source_id, width, height
        );

        Ok(Box::new(SyntheticTrack {
            desktop: self.clone(),
            source_id,
            dimensions: (width, height),
            pixel: window.pixel(),
            interval,
            remaining: settings.chunk_limit,
            sequence: 0,
            released: false,
        }))
    }
}

/// Frame source for one synthetic window
struct SyntheticTrack {
    desktop: SyntheticDesktop,
    source_id: SourceId,
    dimensions: (u32, u32),
    pixel: Rgba<u8>,
    interval: Interval,
    remaining: Option<u64>,
    sequence: u64,
    released: bool,
}

#[async_trait]
impl MediaTrack for SyntheticTrack {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        if self.released || self.remaining == Some(0) {
            return None;
        }

        self.interval.tick().await;

        if self.desktop.window(self.source_id.as_str()).is_none() {
            return Some(Err(SightlineError::recorder(format!(
                "source {} was closed",
                self.source_id
            ))));
        }

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.sequence += 1;
        trace!("Synthetic chunk {} for {}", self.sequence, self.source_id);

        let (w, h) = self.dimensions;
        let frame = RgbaImage::from_pixel(w, h, self.pixel);
        Some(Ok(Bytes::from(frame.into_raw())))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.desktop
            .inner
            .active_streams
            .fetch_sub(1, Ordering::SeqCst);
        debug!("Synthetic stream for {} released", self.source_id);
    }
}

impl Drop for SyntheticTrack {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_source_fails_negotiation() {
        let desktop = SyntheticDesktop::default();
        let constraints = MediaConstraints::desktop_video(SourceId::new("nope"), 400, 300);

        let result = desktop.get_user_media(&constraints).await;
        assert!(matches!(result, Err(SightlineError::Acquisition(_))));
        assert_eq!(desktop.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_audio_request_is_rejected() {
        let desktop = SyntheticDesktop::default();
        let mut constraints = MediaConstraints::desktop_video(SourceId::new("window:1"), 400, 300);
        constraints.audio = true;

        assert!(desktop.get_user_media(&constraints).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_respects_constraints_and_limit() {
        let desktop = SyntheticDesktop::new(vec![
            SyntheticWindow::new("w1", "Editor").with_size(1920, 1080),
        ])
        .with_chunk_limit(2);
        let constraints = MediaConstraints::desktop_video(SourceId::new("w1"), 400, 300);

        let mut track = desktop.get_user_media(&constraints).await.unwrap();
        assert_eq!(track.dimensions(), (400, 225));

        let chunk = track.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk.len(), 400 * 225 * 4);
        assert!(track.next_chunk().await.is_some());
        assert!(track.next_chunk().await.is_none());

        assert_eq!(desktop.active_streams(), 1);
        track.release();
        assert_eq!(desktop.active_streams(), 0);
    }
}

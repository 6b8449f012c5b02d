//! Mock infrastructure for testing
//!
//! Scriptable capture and media providers that record what the pipeline
//! asked of them.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use sightline_core::capture::{DesktopCapturer, MediaProvider, MediaTrack};
use sightline_core::error::{Result, SightlineError};
use sightline_core::types::{MediaConstraints, RawSource, SourceFilter, SourceKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A window source with a small renderable snapshot
pub fn window(id: &str, name: &str) -> RawSource {
    renderable(id, name, SourceKind::Window)
}

/// A source of any kind with a renderable snapshot
pub fn renderable(id: &str, name: &str, kind: SourceKind) -> RawSource {
    RawSource::new(id, name, kind)
        .with_thumbnail(RgbaImage::from_pixel(64, 48, Rgba([200, 40, 40, 255])))
}

/// A window whose snapshot is empty and cannot be rendered
pub fn unrenderable(id: &str, name: &str) -> RawSource {
    RawSource::new(id, name, SourceKind::Window).with_thumbnail(RgbaImage::new(0, 0))
}

/// Desktop capturer returning a fixed list
#[derive(Clone, Default)]
pub struct MockCapturer {
    sources: Arc<Mutex<Vec<RawSource>>>,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MockCapturer {
    pub fn new(sources: Vec<RawSource>) -> Self {
        Self {
            sources: Arc::new(Mutex::new(sources)),
            ..Self::default()
        }
    }

    /// Make every query fail
    pub fn failing() -> Self {
        let capturer = Self::default();
        capturer.fail.store(true, Ordering::SeqCst);
        capturer
    }

    pub fn set_sources(&self, sources: Vec<RawSource>) {
        *self.sources.lock() = sources;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DesktopCapturer for MockCapturer {
    async fn get_sources(&self, _filter: &SourceFilter) -> Result<Vec<RawSource>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SightlineError::enumeration("mock capture denied"));
        }
        Ok(self.sources.lock().clone())
    }
}

#[derive(Default)]
struct ProviderState {
    known: Mutex<Vec<String>>,
    requests: Mutex<Vec<MediaConstraints>>,
    chunks: Mutex<Vec<Bytes>>,
    tracks: Mutex<Vec<Arc<AtomicBool>>>,
    end_after_chunks: AtomicBool,
}

/// Media provider that only knows a fixed set of source ids
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<ProviderState>,
}

impl MockProvider {
    pub fn new(known: &[&str]) -> Self {
        let provider = Self::default();
        *provider.state.known.lock() = known.iter().map(|s| s.to_string()).collect();
        provider
    }

    /// Chunks every new track yields before going quiet
    pub fn with_chunks(self, chunks: Vec<Bytes>) -> Self {
        *self.state.chunks.lock() = chunks;
        self
    }

    /// End tracks once their chunks are used up instead of going quiet
    pub fn ending(self) -> Self {
        self.state.end_after_chunks.store(true, Ordering::SeqCst);
        self
    }

    /// Make an id unknown, as if the window closed
    pub fn forget(&self, id: &str) {
        self.state.known.lock().retain(|k| k != id);
    }

    /// Every constraints object received, in order
    pub fn requests(&self) -> Vec<MediaConstraints> {
        self.state.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.state.requests.lock().len()
    }

    /// Tracks handed out and not yet released
    pub fn live_tracks(&self) -> usize {
        self.state
            .tracks
            .lock()
            .iter()
            .filter(|released| !released.load(Ordering::SeqCst))
            .count()
    }
}

#[async_trait]
impl MediaProvider for MockProvider {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaTrack>> {
        self.state.requests.lock().push(constraints.clone());

        let id = constraints.source_id().as_str();
        if !self.state.known.lock().iter().any(|k| k == id) {
            return Err(SightlineError::acquisition(format!("no such source {}", id)));
        }

        let released = Arc::new(AtomicBool::new(false));
        self.state.tracks.lock().push(released.clone());

        Ok(Box::new(MockTrack {
            dimensions: (constraints.video.max_width, constraints.video.max_height),
            chunks: self.state.chunks.lock().iter().cloned().collect(),
            ends: self.state.end_after_chunks.load(Ordering::SeqCst),
            released,
        }))
    }
}

/// Track yielding scripted chunks
pub struct MockTrack {
    dimensions: (u32, u32),
    chunks: VecDeque<Bytes>,
    ends: bool,
    released: Arc<AtomicBool>,
}

#[async_trait]
impl MediaTrack for MockTrack {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Some(Ok(chunk));
        }
        if self.ends {
            return None;
        }
        std::future::pending().await
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

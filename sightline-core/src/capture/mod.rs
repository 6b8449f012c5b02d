//! Window capture stages and the provider seams they run against
//!
//! This module handles:
//! - Source enumeration with thumbnail rendering
//! - Source selection (auto-first or manual)
//! - Media stream negotiation for the selected source
//!
//! The platform side is reached through [`DesktopCapturer`] and
//! [`MediaProvider`]. [`synthetic::SyntheticDesktop`] implements both.

pub mod acquire;
pub mod enumerator;
pub mod selector;
pub mod stream;
pub mod synthetic;
pub mod thumbnail;

pub use acquire::StreamAcquirer;
pub use enumerator::SourceEnumerator;
pub use selector::{SelectionEvent, SelectionHandle, SelectionMode, Selector};
pub use stream::MediaStream;
pub use synthetic::{SyntheticDesktop, SyntheticWindow};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::types::{MediaConstraints, RawSource, SourceFilter};

/// Lists capturable sources
#[async_trait]
pub trait DesktopCapturer: Send + Sync {
    /// Query the platform for sources admitted by `filter`
    ///
    /// Every call is a fresh query.
    async fn get_sources(&self, filter: &SourceFilter) -> Result<Vec<RawSource>>;
}

/// Negotiates media streams for a capture source
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Request a stream satisfying `constraints`
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<Box<dyn MediaTrack>>;
}

/// Provider-side stream produced by a successful negotiation
#[async_trait]
pub trait MediaTrack: Send {
    /// Negotiated frame size
    fn dimensions(&self) -> (u32, u32);

    /// Next piece of encoded media, `None` once the track has ended
    async fn next_chunk(&mut self) -> Option<Result<Bytes>>;

    /// Give the underlying capture back to the platform
    fn release(&mut self);
}

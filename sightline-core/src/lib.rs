//! Sightline Core Library
//!
//! Desktop window capture: list windows, pick one, record its stream.
//!
//! This library provides:
//! - Source enumeration with PNG thumbnails
//! - Auto-first and manual source selection
//! - Constrained video-only stream acquisition
//! - A recorder sink that drains the stream
//! - A room relay that fans stream bytes out over HTTP
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────┐    ┌────────────────┐    ┌──────────────┐
//! │ SourceEnumerator │───▶│ Selector │───▶│ StreamAcquirer │───▶│ RecorderSink │
//! │ (DesktopCapturer)│    │          │    │ (MediaProvider)│    │ (ChunkSink)  │
//! └──────────────────┘    └──────────┘    └────────────────┘    └──────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod ipc;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod types;

pub use capture::{SelectionMode, SyntheticDesktop, SyntheticWindow};
pub use config::{CaptureConfig, ConfigFile, ServerConfig};
pub use error::{Result, SightlineError};
pub use pipeline::{Pipeline, PipelineMonitor, PipelineState, SessionInfo};
pub use types::{CaptureSource, Handle, SourceId, SourceKind};

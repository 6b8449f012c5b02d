//! Recorder output
//!
//! The recorder drains an acquired stream into a chunk sink:
//! - Discard (default)
//! - Channel (in-process consumers such as previews)

mod recorder;
mod sink;

pub use recorder::{RecorderCounters, RecorderSink, RecorderState, RecordingStats};
pub use sink::{ChannelSink, ChunkSink, DiscardSink};

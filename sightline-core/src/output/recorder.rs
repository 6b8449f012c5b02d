//! Recorder sink
//!
//! Pulls chunks out of an acquired [`MediaStream`] on a background task and
//! hands them to a [`ChunkSink`].
//!
//! State machine: `Idle -> Recording -> Stopped`. There is no way back to
//! `Idle`; a new stream needs a new recorder.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::sink::{ChannelSink, ChunkSink, DiscardSink};
use crate::capture::MediaStream;
use crate::error::{Result, SightlineError};
use crate::types::{MediaChunk, SourceId};

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Live counters, readable while the recorder runs
#[derive(Debug, Default)]
pub struct RecorderCounters {
    chunks: AtomicU64,
    bytes: AtomicU64,
}

impl RecorderCounters {
    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    fn record(&self, len: u64) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len, Ordering::Relaxed);
    }
}

/// Totals for one recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    pub chunks: u64,
    pub bytes: u64,
    pub elapsed_seconds: f64,
}

impl std::fmt::Display for RecordingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} chunks, {} bytes in {:.1}s",
            self.chunks, self.bytes, self.elapsed_seconds
        )
    }
}

/// Wraps a media stream and drains it into a chunk sink
pub struct RecorderSink {
    state: RecorderState,
    sink: Option<Box<dyn ChunkSink>>,
    counters: Arc<RecorderCounters>,
    task: Option<JoinHandle<Result<()>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    source_id: Option<SourceId>,
    dimensions: Option<(u32, u32)>,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl RecorderSink {
    pub fn new(sink: Box<dyn ChunkSink>) -> Self {
        Self {
            state: RecorderState::Idle,
            sink: Some(sink),
            counters: Arc::new(RecorderCounters::default()),
            task: None,
            shutdown_tx: None,
            source_id: None,
            dimensions: None,
            started_at: None,
            stopped_at: None,
        }
    }

    /// Recorder that drops every chunk
    pub fn discarding() -> Self {
        Self::new(Box::new(DiscardSink))
    }

    /// Recorder whose chunks come out of the returned receiver
    pub fn with_channel(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<MediaChunk>) {
        let (sink, rx) = ChannelSink::new(capacity);
        (Self::new(Box::new(sink)), rx)
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn counters(&self) -> Arc<RecorderCounters> {
        self.counters.clone()
    }

    /// Source of the stream being recorded
    pub fn source_id(&self) -> Option<&SourceId> {
        self.source_id.as_ref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Whether chunks are still flowing
    pub fn is_running(&self) -> bool {
        self.state == RecorderState::Recording
            && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start recording `stream`
    ///
    /// Only valid once, from `Idle`. On rejection the stream is dropped,
    /// which releases it.
    pub fn record(&mut self, stream: MediaStream) -> Result<()> {
        match self.state {
            RecorderState::Idle => {}
            RecorderState::Recording => {
                return Err(SightlineError::recorder_state("recorder is already recording"));
            }
            RecorderState::Stopped => {
                return Err(SightlineError::recorder_state(
                    "recorder was stopped; a new stream needs a new recorder",
                ));
            }
        }

        let sink = self
            .sink
            .take()
            .ok_or_else(|| SightlineError::recorder_state("recorder has no sink"))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let started = Instant::now();

        self.source_id = Some(stream.source_id().clone());
        self.dimensions = Some(stream.dimensions());
        info!(
            "Recording stream {} from source {}",
            stream.handle(),
            stream.source_id()
        );

        self.task = Some(tokio::spawn(run_recorder(
            stream,
            sink,
            self.counters.clone(),
            shutdown_rx,
            started,
        )));
        self.shutdown_tx = Some(shutdown_tx);
        self.started_at = Some(started);
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Stop recording and release the stream
    ///
    /// Calling this before `record` does nothing and leaves the recorder
    /// `Idle`. Calling it again after stopping returns the same totals.
    pub async fn stop(&mut self) -> Result<RecordingStats> {
        match self.state {
            RecorderState::Idle => {
                debug!("stop() on an idle recorder ignored");
                return Ok(RecordingStats::default());
            }
            RecorderState::Stopped => return Ok(self.stats()),
            RecorderState::Recording => {}
        }

        info!("Stopping recorder");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Recording ended with an error: {}", e),
                Err(e) => warn!("Recorder task failed: {}", e),
            }
        }

        self.stopped_at = Some(Instant::now());
        self.state = RecorderState::Stopped;

        let stats = self.stats();
        info!("Recorder stopped: {}", stats);
        Ok(stats)
    }

    /// Totals so far
    pub fn stats(&self) -> RecordingStats {
        let elapsed = match (self.started_at, self.stopped_at) {
            (Some(start), Some(stop)) => stop.duration_since(start).as_secs_f64(),
            (Some(start), None) => start.elapsed().as_secs_f64(),
            _ => 0.0,
        };

        RecordingStats {
            chunks: self.counters.chunks(),
            bytes: self.counters.bytes(),
            elapsed_seconds: elapsed,
        }
    }
}

impl Drop for RecorderSink {
    fn drop(&mut self) {
        // The task releases the stream once it sees the signal
        if let Some(tx) = self.shutdown_tx.take() {
            debug!("Recorder dropped while recording, stopping");
            let _ = tx.send(());
        }
    }
}

/// Drain `stream` into `sink` until shutdown or end of stream
async fn run_recorder(
    mut stream: MediaStream,
    mut sink: Box<dyn ChunkSink>,
    counters: Arc<RecorderCounters>,
    mut shutdown_rx: oneshot::Receiver<()>,
    started: Instant,
) -> Result<()> {
    let mut sequence = 0u64;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break Ok(()),
            next = stream.next_chunk() => next,
        };

        let data = match next {
            Some(Ok(data)) => data,
            Some(Err(e)) => break Err(e),
            None => {
                info!("Media stream {} ended", stream.handle());
                break Ok(());
            }
        };

        let chunk = MediaChunk {
            sequence,
            timestamp_ms: started.elapsed().as_millis() as u64,
            data,
        };
        let len = chunk.len() as u64;

        let delivered = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break Ok(()),
            result = sink.deliver(chunk) => result,
        };
        if let Err(e) = delivered {
            break Err(e);
        }

        counters.record(len);
        sequence += 1;
    };

    stream.release();
    if let Err(e) = sink.finish().await {
        warn!("Chunk sink failed to finish: {}", e);
    }
    outcome
}

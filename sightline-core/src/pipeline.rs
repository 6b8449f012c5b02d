//! Capture pipeline
//!
//! Wires the stages into one chain:
//!
//! ```text
//! SourceEnumerator -> Selector -> StreamAcquirer -> RecorderSink
//! ```
//!
//! A pipeline runs its chain once. [`PipelineMonitor`] is a cloneable view
//! of the running chain for code that must not borrow the pipeline, such as
//! the IPC daemon.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::capture::{
    DesktopCapturer, MediaProvider, SelectionHandle, SelectionMode, Selector, SourceEnumerator,
    StreamAcquirer, SyntheticDesktop,
};
use crate::config::CaptureConfig;
use crate::error::{Result, SightlineError};
use crate::output::{RecorderCounters, RecorderSink, RecorderState, RecordingStats};
use crate::session::CaptureSession;
use crate::types::{CaptureSource, Handle, SourceId};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// Created but not started
    Idle,
    /// Listing sources
    Enumerating,
    /// Waiting for the selector
    Selecting,
    /// Negotiating the stream
    Acquiring,
    /// Chunks are flowing into the recorder
    Recording,
    /// Stopped by the caller
    Stopped,
    /// A stage failed
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Enumerating => "enumerating",
            Self::Selecting => "selecting",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// What a successful start produced
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub handle: Handle,
    pub source: CaptureSource,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug)]
struct MonitorState {
    handle: Handle,
    state: PipelineState,
    mode: SelectionMode,
    sources: Vec<CaptureSource>,
    selected: Option<SourceId>,
    dimensions: Option<(u32, u32)>,
    started_at: Option<Instant>,
    counters: Arc<RecorderCounters>,
}

/// Read view of a pipeline plus its manual selection entry point
#[derive(Debug, Clone)]
pub struct PipelineMonitor {
    shared: Arc<RwLock<MonitorState>>,
    selection: Option<SelectionHandle>,
}

impl PipelineMonitor {
    fn new(
        handle: Handle,
        mode: SelectionMode,
        counters: Arc<RecorderCounters>,
        selection: Option<SelectionHandle>,
    ) -> Self {
        Self {
            shared: Arc::new(RwLock::new(MonitorState {
                handle,
                state: PipelineState::Idle,
                mode,
                sources: Vec::new(),
                selected: None,
                dimensions: None,
                started_at: None,
                counters,
            })),
            selection,
        }
    }

    pub fn handle(&self) -> Handle {
        self.shared.read().handle
    }

    pub fn state(&self) -> PipelineState {
        self.shared.read().state
    }

    pub fn mode(&self) -> SelectionMode {
        self.shared.read().mode
    }

    /// Sources of the last enumeration
    pub fn sources(&self) -> Vec<CaptureSource> {
        self.shared.read().sources.clone()
    }

    pub fn selected(&self) -> Option<SourceId> {
        self.shared.read().selected.clone()
    }

    /// Negotiated stream size once recording
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.shared.read().dimensions
    }

    /// Recording totals so far
    pub fn stats(&self) -> RecordingStats {
        let shared = self.shared.read();
        RecordingStats {
            chunks: shared.counters.chunks(),
            bytes: shared.counters.bytes(),
            elapsed_seconds: shared
                .started_at
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0),
        }
    }

    /// Submit a manual selection
    ///
    /// Fails when the pipeline is not in manual mode, is not currently
    /// waiting for a selection, or `id` was not listed.
    pub async fn select(&self, id: impl Into<SourceId>) -> Result<()> {
        let id = id.into();
        {
            let shared = self.shared.read();
            if shared.mode != SelectionMode::Manual {
                return Err(SightlineError::selection(
                    "session selects automatically; manual selection is disabled",
                ));
            }
            if shared.state != PipelineState::Selecting {
                return Err(SightlineError::selection(format!(
                    "session is not waiting for a selection (state: {})",
                    shared.state
                )));
            }
            if !shared.sources.iter().any(|s| s.id == id) {
                return Err(SightlineError::selection(format!("unknown source {}", id)));
            }
        }

        let handle = self
            .selection
            .as_ref()
            .ok_or_else(|| SightlineError::selection("no selection channel"))?;
        handle.select(id).await
    }

    fn update(&self, f: impl FnOnce(&mut MonitorState)) {
        f(&mut self.shared.write());
    }
}

/// One enumerate, select, acquire, record chain
pub struct Pipeline {
    handle: Handle,
    config: CaptureConfig,
    enumerator: SourceEnumerator,
    selector: Selector,
    acquirer: StreamAcquirer,
    recorder: RecorderSink,
    session: CaptureSession,
    state: PipelineState,
    monitor: PipelineMonitor,
}

impl Pipeline {
    /// Create a pipeline over the given providers
    pub fn new(
        config: CaptureConfig,
        capturer: Arc<dyn DesktopCapturer>,
        provider: Arc<dyn MediaProvider>,
    ) -> Self {
        let handle = Handle::new();

        let enumerator = SourceEnumerator::new(capturer)
            .with_thumbnail_size(config.thumbnail_width, config.thumbnail_height);
        let acquirer =
            StreamAcquirer::new(provider).with_max_size(config.max_width, config.max_height);

        let (selector, selection) = match config.selection {
            SelectionMode::AutoFirst => (Selector::auto_first(), None),
            SelectionMode::Manual => {
                let (selector, handle) = Selector::manual(config.selection_timeout());
                (selector, Some(handle))
            }
        };

        let recorder = RecorderSink::discarding();
        let monitor = PipelineMonitor::new(handle, config.selection, recorder.counters(), selection);

        info!(
            "Pipeline {} configured: {} selection, max {}x{}",
            handle, config.selection, config.max_width, config.max_height
        );

        Self {
            handle,
            config,
            enumerator,
            selector,
            acquirer,
            recorder,
            session: CaptureSession::new(),
            state: PipelineState::Idle,
            monitor,
        }
    }

    /// Pipeline backed by the synthetic desktop
    pub fn with_desktop(config: CaptureConfig, desktop: SyntheticDesktop) -> Self {
        let desktop = Arc::new(desktop);
        Self::new(config, desktop.clone(), desktop)
    }

    /// Use `recorder` instead of the discarding default
    ///
    /// Has no effect once the pipeline has started.
    pub fn with_recorder(mut self, recorder: RecorderSink) -> Self {
        if self.state != PipelineState::Idle || recorder.state() != RecorderState::Idle {
            warn!("Ignoring recorder replacement on pipeline {}", self.handle);
            return self;
        }
        let counters = recorder.counters();
        self.recorder = recorder;
        self.monitor.update(|m| m.counters = counters);
        self
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn recorder(&self) -> &RecorderSink {
        &self.recorder
    }

    /// Cloneable view of this pipeline
    pub fn monitor(&self) -> PipelineMonitor {
        self.monitor.clone()
    }

    /// Manual selection entry point, `None` in auto mode
    pub fn selection_handle(&self) -> Option<SelectionHandle> {
        self.monitor.selection.clone()
    }

    /// Run the chain up to recording
    ///
    /// Any stage failure leaves the pipeline `Failed` and returns that
    /// stage's error.
    pub async fn start(&mut self) -> Result<SessionInfo> {
        if self.state != PipelineState::Idle {
            return Err(SightlineError::SessionAlreadyRunning);
        }

        info!("Starting pipeline {}", self.handle);
        match self.run_chain().await {
            Ok(info) => Ok(info),
            Err(e) => {
                self.set_state(PipelineState::Failed);
                warn!("Pipeline {} failed: {}", self.handle, e);
                Err(e)
            }
        }
    }

    async fn run_chain(&mut self) -> Result<SessionInfo> {
        self.set_state(PipelineState::Enumerating);
        let sources = self.enumerator.enumerate(&self.config.filter()).await?;
        self.monitor.update(|m| m.sources = sources.clone());
        self.session.replace_sources(sources);

        self.set_state(PipelineState::Selecting);
        let id = self.selector.select(&self.session).await?;
        if !self.session.set_selected(id.clone()) {
            return Err(SightlineError::selection(format!("unknown source {}", id)));
        }
        self.monitor.update(|m| m.selected = Some(id.clone()));

        self.set_state(PipelineState::Acquiring);
        let stream = self.acquirer.acquire(&id).await?;
        let (width, height) = stream.dimensions();

        self.recorder.record(stream)?;
        self.monitor.update(|m| {
            m.dimensions = Some((width, height));
            m.started_at = Some(Instant::now());
        });
        self.set_state(PipelineState::Recording);

        let source = self
            .session
            .selected_source()
            .cloned()
            .ok_or(SightlineError::NoActiveSession)?;

        info!(
            "Pipeline {} recording {} ({}) at {}x{}",
            self.handle, source.id, source.name, width, height
        );

        Ok(SessionInfo {
            handle: self.session.handle(),
            source,
            width,
            height,
        })
    }

    /// Stop recording and release the stream
    ///
    /// A failed pipeline stays `Failed`; anything else ends `Stopped`.
    pub async fn stop(&mut self) -> Result<RecordingStats> {
        if self.state == PipelineState::Stopped {
            return Ok(self.recorder.stats());
        }

        info!("Stopping pipeline {}", self.handle);
        let stats = self.recorder.stop().await?;

        if self.state != PipelineState::Failed {
            self.set_state(PipelineState::Stopped);
        }
        info!("Pipeline {} stopped - {}", self.handle, stats);
        Ok(stats)
    }

    /// Whether the recorder is still receiving chunks
    pub fn is_running(&self) -> bool {
        self.state == PipelineState::Recording && self.recorder.is_running()
    }

    /// Recording totals so far
    pub fn stats(&self) -> RecordingStats {
        self.recorder.stats()
    }

    fn set_state(&mut self, state: PipelineState) {
        self.state = state;
        self.monitor.update(|m| m.state = state);
    }
}

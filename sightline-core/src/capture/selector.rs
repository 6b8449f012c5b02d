//! Source selection
//!
//! One selector, two modes: take the first displayed source, or wait for an
//! external selection event.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Result, SightlineError};
use crate::session::CaptureSession;
use crate::types::SourceId;

/// Pending selection events buffered per selector
const EVENT_BUFFER: usize = 16;

/// How the capture source is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// First source of the enumeration that rendered a thumbnail
    #[default]
    #[serde(rename = "auto")]
    AutoFirst,
    /// Wait for an externally triggered selection
    Manual,
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutoFirst => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "auto-first" | "first" => Ok(Self::AutoFirst),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown selection mode: {}", s)),
        }
    }
}

/// A user pick, e.g. a click on a thumbnail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEvent {
    pub source_id: Option<SourceId>,
}

impl SelectionEvent {
    pub fn new(id: impl Into<SourceId>) -> Self {
        Self {
            source_id: Some(id.into()),
        }
    }

    /// An event that carries no id
    pub fn empty() -> Self {
        Self { source_id: None }
    }
}

/// Sending side of a manual selector
#[derive(Debug, Clone)]
pub struct SelectionHandle {
    tx: mpsc::Sender<SelectionEvent>,
}

impl SelectionHandle {
    /// Submit a selection for `id`
    pub async fn select(&self, id: impl Into<SourceId>) -> Result<()> {
        self.send(SelectionEvent::new(id)).await
    }

    pub async fn send(&self, event: SelectionEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| SightlineError::selection("selector is no longer waiting"))
    }

    /// Whether the selector still listens
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Resolves exactly one source id per capture chain
pub struct Selector {
    mode: SelectionMode,
    timeout: Option<Duration>,
    events: Option<mpsc::Receiver<SelectionEvent>>,
}

impl Selector {
    /// Selector that takes the first displayed source
    pub fn auto_first() -> Self {
        Self {
            mode: SelectionMode::AutoFirst,
            timeout: None,
            events: None,
        }
    }

    /// Selector that waits for events sent through the returned handle
    ///
    /// `timeout` bounds the wait; with `None` the wait is unbounded. The
    /// wait also ends once every handle clone is gone, which cannot happen
    /// while a [`crate::pipeline::PipelineMonitor`] holds one.
    pub fn manual(timeout: Option<Duration>) -> (Self, SelectionHandle) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let selector = Self {
            mode: SelectionMode::Manual,
            timeout,
            events: Some(rx),
        };
        (selector, SelectionHandle { tx })
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve the source to capture from `session`'s last enumeration
    pub async fn select(&mut self, session: &CaptureSession) -> Result<SourceId> {
        if session.sources().is_empty() {
            return Err(SightlineError::NoSources);
        }

        match self.mode {
            SelectionMode::AutoFirst => {
                let first = &session.sources()[0];
                info!("Auto-selected source {} ({})", first.id, first.name);
                Ok(first.id.clone())
            }
            SelectionMode::Manual => self.wait_for_event(session).await,
        }
    }

    async fn wait_for_event(&mut self, session: &CaptureSession) -> Result<SourceId> {
        let timeout = self.timeout;
        let events = self
            .events
            .as_mut()
            .ok_or_else(|| SightlineError::selection("selection events already consumed"))?;

        info!(
            "Waiting for a selection among {} source(s)",
            session.sources().len()
        );

        let wait = async {
            loop {
                let Some(event) = events.recv().await else {
                    return Err(SightlineError::selection("selection channel closed"));
                };

                match event.source_id {
                    None => warn!("Ignoring selection event without a source id"),
                    Some(id) if id.is_empty() => {
                        warn!("Ignoring selection event with an empty source id")
                    }
                    Some(id) if !session.contains(&id) => {
                        warn!("Ignoring selection of unknown source {}", id)
                    }
                    Some(id) => {
                        debug!("Selection event accepted for {}", id);
                        return Ok(id);
                    }
                }
            }
        };

        let id = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| SightlineError::SelectionTimeout(limit))??,
            None => wait.await?,
        };

        // One-shot: later events have nowhere to go
        self.events = None;
        info!("Manually selected source {}", id);
        Ok(id)
    }
}

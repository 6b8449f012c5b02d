//! Error types for Sightline

use std::time::Duration;
use thiserror::Error;

/// Result type alias using SightlineError
pub type Result<T> = std::result::Result<T, SightlineError>;

/// Main error type for Sightline operations
#[derive(Debug, Error)]
pub enum SightlineError {
    /// The capture provider denied or could not perform source enumeration
    #[error("Enumeration error: {0}")]
    Enumeration(String),

    /// A selection could not be resolved
    #[error("Selection error: {0}")]
    Selection(String),

    /// Manual selection did not receive a valid id in time
    #[error("No source selected within {0:?}")]
    SelectionTimeout(Duration),

    /// Enumeration produced nothing that can be selected
    #[error("No capturable sources available")]
    NoSources,

    /// Media negotiation failed
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// A thumbnail could not be rendered
    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    /// Recorder used outside its state machine
    #[error("Recorder state error: {0}")]
    RecorderState(String),

    /// Chunk delivery failed
    #[error("Recorder error: {0}")]
    Recorder(String),

    /// Room not present in the registry
    #[error("Room {0} not found")]
    RoomNotFound(String),

    /// Every seat of the room is taken
    #[error("Room is full")]
    RoomFull,

    /// Seat is not bound to a client
    #[error("Seat {0} not in room")]
    SeatNotInRoom(u32),

    /// Room actor is no longer running
    #[error("Room {0} stopped")]
    RoomStopped(String),

    /// IPC communication error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Capture session not active
    #[error("No active capture session")]
    NoActiveSession,

    /// Session already running
    #[error("Capture session already running")]
    SessionAlreadyRunning,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SightlineError>,
    },
}

impl SightlineError {
    /// Create an enumeration error
    pub fn enumeration(msg: impl Into<String>) -> Self {
        Self::Enumeration(msg.into())
    }

    /// Create a selection error
    pub fn selection(msg: impl Into<String>) -> Self {
        Self::Selection(msg.into())
    }

    /// Create an acquisition error
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    /// Create a thumbnail error
    pub fn thumbnail(msg: impl Into<String>) -> Self {
        Self::Thumbnail(msg.into())
    }

    /// Create a recorder state error
    pub fn recorder_state(msg: impl Into<String>) -> Self {
        Self::RecorderState(msg.into())
    }

    /// Create a recorder error
    pub fn recorder(msg: impl Into<String>) -> Self {
        Self::Recorder(msg.into())
    }

    /// Create an IPC error
    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::Ipc(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &SightlineError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// A short hint telling the user what to try next
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::Enumeration(_) => Some(
                "Make sure screen recording permission is granted to this application",
            ),
            Self::Selection(_) | Self::SelectionTimeout(_) => Some(
                "Pick a source with `sightline select <ID>` using an id from `sightline list-sources`",
            ),
            Self::NoSources => {
                Some("No window produced a thumbnail; open a window and try again")
            }
            Self::Acquisition(_) => Some(
                "The window may have closed since it was listed; run `sightline list-sources` again",
            ),
            Self::Config(_) => Some("Check ~/.config/sightline/config.toml for errors"),
            Self::NoActiveSession => Some("Start a session with `sightline record`"),
            Self::SessionAlreadyRunning => Some("Stop the running session with `sightline stop`"),
            Self::RoomFull => Some("Every seat is taken; create a new room"),
            _ => None,
        }
    }

    /// Whether the user can fix this without code changes
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::Enumeration(_)
                | Self::Selection(_)
                | Self::SelectionTimeout(_)
                | Self::NoSources
                | Self::Acquisition(_)
                | Self::Config(_)
                | Self::NoActiveSession
                | Self::SessionAlreadyRunning
                | Self::RoomNotFound(_)
                | Self::RoomFull
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

// Conversions from external error types

impl From<image::ImageError> for SightlineError {
    fn from(err: image::ImageError) -> Self {
        Self::Thumbnail(err.to_string())
    }
}

impl From<toml::de::Error> for SightlineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config file: {}", err))
    }
}

impl From<serde_json::Error> for SightlineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Ipc(format!("Invalid message: {}", err))
    }
}

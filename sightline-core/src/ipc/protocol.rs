//! IPC protocol definitions
//!
//! Newline-delimited JSON messages exchanged between the daemon and CLI.

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineMonitor;
use crate::types::CaptureSource;

/// Messages that can be sent to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcMessage {
    /// Check if daemon is alive
    Ping,
    /// Request current status
    Status,
    /// Request recording statistics
    Stats,
    /// Request the sources of the daemon's enumeration
    ListSources,
    /// Pick a source for a session waiting in manual mode
    Select { source_id: String },
    /// Stop the daemon gracefully
    Stop,
}

/// Responses from the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Simple acknowledgment
    Ok,
    /// Pong response to ping
    Pong,
    /// Error response
    Error { message: String },
    /// Status response
    Status(SessionStatus),
    /// Statistics response
    Stats(SessionStatistics),
    /// Enumerated sources
    Sources { sources: Vec<CaptureSource> },
    /// Shutdown acknowledgment
    Stopping,
}

/// Current session status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Is the recorder receiving chunks
    pub running: bool,
    /// Pipeline state name
    pub state: String,
    /// Selection mode name
    pub mode: String,
    /// Selected source id
    pub selected: Option<String>,
    /// Selected source name
    pub source_name: Option<String>,
    /// Negotiated stream size
    pub resolution: Option<(u32, u32)>,
    /// Number of sources listed
    pub source_count: usize,
    /// Process ID
    pub pid: u32,
    /// Uptime in seconds
    pub uptime_seconds: f64,
}

/// Recording statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    pub chunks: u64,
    pub bytes: u64,
    pub elapsed_seconds: f64,
    pub resolution: Option<(u32, u32)>,
}

impl SessionStatus {
    /// Snapshot `monitor`
    pub fn from_monitor(monitor: &PipelineMonitor, uptime_seconds: f64) -> Self {
        let sources = monitor.sources();
        let selected = monitor.selected();
        let source_name = selected.as_ref().and_then(|id| {
            sources
                .iter()
                .find(|s| &s.id == id)
                .map(|s| s.name.clone())
        });
        let state = monitor.state();

        Self {
            running: state == crate::pipeline::PipelineState::Recording,
            state: state.to_string(),
            mode: monitor.mode().to_string(),
            selected: selected.map(|id| id.to_string()),
            source_name,
            resolution: monitor.dimensions(),
            source_count: sources.len(),
            pid: std::process::id(),
            uptime_seconds,
        }
    }
}

impl SessionStatistics {
    pub fn from_monitor(monitor: &PipelineMonitor) -> Self {
        let stats = monitor.stats();
        Self {
            chunks: stats.chunks,
            bytes: stats.bytes,
            elapsed_seconds: stats.elapsed_seconds,
            resolution: monitor.dimensions(),
        }
    }
}

/// One JSON document per line
fn encode_line<T: Serialize>(value: &T) -> Vec<u8> {
    let mut line = serde_json::to_vec(value).unwrap_or_default();
    line.push(b'\n');
    line
}

impl IpcMessage {
    /// JSON line including the trailing newline
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_line(self)
    }

    /// Parse one line, without its newline
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl IpcResponse {
    /// JSON line including the trailing newline
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_line(self)
    }

    /// Parse one line, without its newline
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_wire_format() {
        let msg = IpcMessage::Select {
            source_id: "window:2".to_string(),
        };
        let bytes = msg.to_bytes();
        assert_eq!(bytes.last(), Some(&b'\n'));

        let text = std::str::from_utf8(&bytes).unwrap().trim();
        assert_eq!(text, r#"{"type":"Select","source_id":"window:2"}"#);
        assert_eq!(IpcMessage::from_bytes(text.as_bytes()).unwrap(), msg);
    }

    #[test]
    fn test_sources_response_parses() {
        let resp = IpcResponse::Sources { sources: vec![] };
        let bytes = resp.to_bytes();
        let parsed = IpcResponse::from_bytes(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(parsed, resp);
    }
}

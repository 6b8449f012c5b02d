//! IPC client for CLI commands
//!
//! One request line out, one response line back.

use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use super::protocol::{IpcMessage, IpcResponse, SessionStatistics, SessionStatus};
use super::socket_path;
use crate::error::{Result, SightlineError};
use crate::types::CaptureSource;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per request, each direction
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection to a running daemon
pub struct IpcClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

/// Bound `fut` by `limit`, naming `what` in the error
async fn bounded<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| SightlineError::ipc(format!("{} timed out", what)))?
        .map_err(|e| SightlineError::ipc(format!("{} failed: {}", what, e)))
}

impl IpcClient {
    /// Connect to the daemon on the default socket
    pub async fn connect() -> Result<Self> {
        Self::connect_to(socket_path(), CONNECT_TIMEOUT).await
    }

    /// Connect to a daemon listening on `path`
    ///
    /// A missing socket means no session is running.
    pub async fn connect_to(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SightlineError::NoActiveSession);
        }

        let stream = bounded(timeout, "connect", UnixStream::connect(path)).await?;
        debug!("Connected to daemon at {:?}", path);

        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    async fn request(&mut self, msg: IpcMessage) -> Result<IpcResponse> {
        bounded(IO_TIMEOUT, "send", self.writer.write_all(&msg.to_bytes())).await?;

        let line = bounded(IO_TIMEOUT, "receive", self.lines.next_line())
            .await?
            .ok_or_else(|| SightlineError::ipc("daemon closed the connection"))?;

        Ok(IpcResponse::from_bytes(line.trim().as_bytes())?)
    }

    /// Whether the daemon answers
    pub async fn ping(&mut self) -> Result<bool> {
        Ok(matches!(self.request(IpcMessage::Ping).await, Ok(IpcResponse::Pong)))
    }

    pub async fn status(&mut self) -> Result<SessionStatus> {
        match self.request(IpcMessage::Status).await? {
            IpcResponse::Status(status) => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    /// Recording totals; an error while nothing is recording
    pub async fn stats(&mut self) -> Result<SessionStatistics> {
        match self.request(IpcMessage::Stats).await? {
            IpcResponse::Stats(stats) => Ok(stats),
            other => Err(unexpected(other)),
        }
    }

    /// Sources of the daemon's enumeration
    pub async fn list_sources(&mut self) -> Result<Vec<CaptureSource>> {
        match self.request(IpcMessage::ListSources).await? {
            IpcResponse::Sources { sources } => Ok(sources),
            other => Err(unexpected(other)),
        }
    }

    /// Pick the source a manual-mode daemon should record
    pub async fn select(&mut self, source_id: impl Into<String>) -> Result<()> {
        let msg = IpcMessage::Select {
            source_id: source_id.into(),
        };
        match self.request(msg).await? {
            IpcResponse::Ok => Ok(()),
            IpcResponse::Error { message } => Err(SightlineError::selection(message)),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the daemon to stop
    pub async fn stop(&mut self) -> Result<()> {
        match self.request(IpcMessage::Stop).await? {
            IpcResponse::Stopping => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: IpcResponse) -> SightlineError {
    match response {
        IpcResponse::Error { message } => SightlineError::Ipc(message),
        other => SightlineError::ipc(format!("unexpected response: {:?}", other)),
    }
}

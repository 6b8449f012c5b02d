//! IPC server for daemon mode
//!
//! Listens on a Unix socket and answers CLI commands from a
//! [`PipelineMonitor`]. One client is served at a time.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::protocol::{IpcMessage, IpcResponse, SessionStatistics, SessionStatus};
use super::socket_path;
use crate::error::{Result, SightlineError};
use crate::pipeline::{PipelineMonitor, PipelineState};

/// How long `accept_one` waits before giving the caller a chance to exit
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// What the accept loop does after a connection closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

/// Daemon side of the control socket
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    monitor: PipelineMonitor,
    shutdown_tx: broadcast::Sender<()>,
    started: Instant,
}

impl IpcServer {
    /// Server on the default socket path
    pub fn new(monitor: PipelineMonitor) -> Self {
        Self::with_path(monitor, socket_path())
    }

    pub fn with_path(monitor: PipelineMonitor, path: impl Into<PathBuf>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            socket_path: path.into(),
            listener: None,
            monitor,
            shutdown_tx,
            started: Instant::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one, and restrict it to the owner
    pub async fn start(&mut self) -> Result<()> {
        let path = &self.socket_path;
        if path.exists() {
            std::fs::remove_file(path)
                .map_err(|e| SightlineError::ipc(format!("stale socket {:?}: {}", path, e)))?;
        }
        if let Some(dir) = path.parent().filter(|dir| !dir.exists()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| SightlineError::ipc(format!("socket directory {:?}: {}", dir, e)))?;
        }

        let listener = UnixListener::bind(path)
            .map_err(|e| SightlineError::ipc(format!("bind {:?}: {}", path, e)))?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| SightlineError::ipc(format!("socket permissions: {}", e)))?;

        info!("IPC server listening on {:?}", path);
        self.listener = Some(listener);
        Ok(())
    }

    /// Fires once a client sent `Stop`
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Wait briefly for one client and serve it until it disconnects
    ///
    /// Returns false once a client asked the daemon to stop.
    pub async fn accept_one(&self) -> Result<bool> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| SightlineError::ipc("server not started"))?;

        let stream = match tokio::time::timeout(ACCEPT_POLL, listener.accept()).await {
            Err(_) => return Ok(true),
            Ok(Err(e)) => {
                warn!("IPC accept failed: {}", e);
                return Ok(true);
            }
            Ok(Ok((stream, _))) => stream,
        };

        debug!("IPC client connected");
        let flow = match self.serve_client(stream).await {
            Ok(flow) => flow,
            Err(e) => {
                warn!("IPC client dropped: {}", e);
                Flow::Continue
            }
        };
        Ok(flow == Flow::Continue)
    }

    /// Serve until a client asks the daemon to stop
    pub async fn run(&self) -> Result<()> {
        while self.accept_one().await? {}
        Ok(())
    }

    async fn serve_client(&self, stream: UnixStream) -> Result<Flow> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (response, flow) = match IpcMessage::from_bytes(line.as_bytes()) {
                Ok(msg) => self.respond(msg).await,
                Err(e) => {
                    warn!("Invalid IPC message: {}", e);
                    (IpcResponse::error(format!("Invalid message: {}", e)), Flow::Continue)
                }
            };
            writer.write_all(&response.to_bytes()).await?;

            if flow == Flow::Shutdown {
                let _ = self.shutdown_tx.send(());
                return Ok(Flow::Shutdown);
            }
        }

        debug!("IPC client disconnected");
        Ok(Flow::Continue)
    }

    async fn respond(&self, msg: IpcMessage) -> (IpcResponse, Flow) {
        let response = match msg {
            IpcMessage::Ping => IpcResponse::Pong,
            IpcMessage::Status => {
                let uptime = self.started.elapsed().as_secs_f64();
                IpcResponse::Status(SessionStatus::from_monitor(&self.monitor, uptime))
            }
            IpcMessage::Stats => match self.monitor.state() {
                PipelineState::Recording | PipelineState::Stopped => {
                    IpcResponse::Stats(SessionStatistics::from_monitor(&self.monitor))
                }
                state => IpcResponse::error(format!("Not recording (state: {})", state)),
            },
            IpcMessage::ListSources => IpcResponse::Sources {
                sources: self.monitor.sources(),
            },
            IpcMessage::Select { source_id } => {
                match self.monitor.select(source_id.as_str()).await {
                    Ok(()) => {
                        info!("Selection of {} received via IPC", source_id);
                        IpcResponse::Ok
                    }
                    Err(e) => {
                        warn!("Rejected IPC selection of {}: {}", source_id, e);
                        IpcResponse::error(e.to_string())
                    }
                }
            }
            IpcMessage::Stop => {
                info!("Stop requested via IPC");
                return (IpcResponse::Stopping, Flow::Shutdown);
            }
        };
        (response, Flow::Continue)
    }

    /// Remove the socket file
    pub fn cleanup(&self) {
        if !self.socket_path.exists() {
            return;
        }
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => debug!("Removed socket {:?}", self.socket_path),
            Err(e) => warn!("Failed to remove socket {:?}: {}", self.socket_path, e),
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

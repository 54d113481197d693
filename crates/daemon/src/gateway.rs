// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC gateway: the master's two listening sockets.
//!
//! The gateway owns the control TCP listener (whose descriptor workers
//! inherit) and the Unix socket workers dial for the handshake. New
//! workers and operator commands surface on two bounded channels; the
//! master controller consumes both.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handoff_core::{MessagePayload, SystemClock, MASTER_PID};
use handoff_wire::{parse_operator_line, OperatorLine};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UnixListener};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MasterConfig;
use crate::fdpass::{self, FdPassError};
use crate::record::{WorkerHandle, WorkerProcess};

/// Errors from gateway startup. All of them are fatal for the master.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot bind control listener on {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("cannot bind unix socket at {path}: {source}")]
    BindSocket { path: PathBuf, source: io::Error },
}

/// Errors from one worker handshake. The offending connection is closed
/// and nothing is registered.
#[derive(Debug, Error)]
enum HandshakeError {
    #[error("descriptor transfer failed: {0}")]
    FdPass(#[from] FdPassError),

    #[error("handshake I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("worker closed before sending a PID line")]
    MissingPid,

    #[error("invalid PID line {0:?}")]
    InvalidPid(String),

    #[error("handshake task aborted")]
    Task,
}

/// A new worker connection, handshake complete.
pub struct WorkerEvent {
    pub handle: Arc<WorkerHandle>,
    pub reader: tokio::net::unix::OwnedReadHalf,
}

/// One line received on an operator connection.
pub struct OperatorEvent {
    /// Peer address of the operator connection.
    pub source: String,
    pub frame: MessagePayload,
    /// Writes replies on the same connection.
    pub reply: Reply,
}

/// Best-effort line writer for one operator connection.
#[derive(Clone)]
pub struct Reply {
    source: String,
    writer: Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
}

impl Reply {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static, source: impl Into<String>) -> Self {
        Self { source: source.into(), writer: Arc::new(tokio::sync::Mutex::new(Box::new(writer))) }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Write `line` plus a terminator. Failures are logged, not propagated;
    /// a vanished operator must not take the dispatcher down.
    pub async fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock().await;
        let mut buf = line.as_bytes().to_vec();
        buf.push(b'\n');
        if let Err(e) = writer.write_all(&buf).await {
            debug!(source = %self.source, error = %e, "operator reply dropped");
            return;
        }
        let _ = writer.flush().await;
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply").field("source", &self.source).finish()
    }
}

/// The gateway handle. Dropping it does not stop the accept loops; call
/// [`IpcGateway::close`].
pub struct IpcGateway {
    local_addr: SocketAddr,
    socket_path: PathBuf,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl IpcGateway {
    /// Bind both listeners and spawn the accept loops.
    ///
    /// The Unix socket path is removed and recreated. Returns the gateway
    /// plus the two event channels, both buffered at one element.
    pub async fn start(
        config: &MasterConfig,
        cancel: &CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<WorkerEvent>, mpsc::Receiver<OperatorEvent>), GatewayError>
    {
        let control = TcpListener::bind(&config.control_addr).await.map_err(|source| {
            GatewayError::Bind { addr: config.control_addr.clone(), source }
        })?;
        let local_addr = control.local_addr().map_err(|source| GatewayError::Bind {
            addr: config.control_addr.clone(),
            source,
        })?;

        match std::fs::remove_file(&config.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(GatewayError::BindSocket { path: config.socket_path.clone(), source })
            }
        }
        let unix = UnixListener::bind(&config.socket_path).map_err(|source| {
            GatewayError::BindSocket { path: config.socket_path.clone(), source }
        })?;

        let (worker_tx, worker_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::channel(1);
        let cancel = cancel.child_token();
        let running = Arc::new(AtomicBool::new(true));

        let control = Arc::new(control);
        tokio::spawn(run_unix_accept(
            unix,
            Arc::clone(&control),
            worker_tx,
            cancel.clone(),
            config.accept_deadline,
            config.handshake_timeout,
        ));
        tokio::spawn(run_control_accept(
            Arc::clone(&control),
            event_tx,
            cancel.clone(),
            config.accept_deadline,
        ));

        info!(addr = %local_addr, "gateway listening for operators and inheritors");
        info!(path = %config.socket_path.display(), "gateway listening for worker handshakes");

        let gateway = Self {
            local_addr,
            socket_path: config.socket_path.clone(),
            running,
            cancel,
        };
        Ok((gateway, worker_rx, event_rx))
    }

    /// Bound control address; tests bind port 0 and read it back here.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Shared running flag, read by the orchestrator's health check.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stop both accept loops and remove the socket path. Idempotent,
    /// best-effort.
    pub fn close(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        self.cancel.cancel();
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.socket_path.display(), error = %e, "socket removal failed");
            }
        }
        info!("gateway closed");
    }
}

/// Accept loop for worker handshakes on the Unix socket.
///
/// The periodic deadline bounds how long cancellation can go unobserved;
/// a lapsed deadline just re-arms the accept.
async fn run_unix_accept(
    unix: UnixListener,
    control: Arc<TcpListener>,
    worker_tx: mpsc::Sender<WorkerEvent>,
    cancel: CancellationToken,
    accept_deadline: Duration,
    handshake_timeout: Duration,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("unix accept loop stopped");
                return;
            }
            accepted = tokio::time::timeout(accept_deadline, unix.accept()) => {
                let (stream, _) = match accepted {
                    Err(_) => continue,
                    Ok(Err(e)) => {
                        error!(error = %e, "unix accept error");
                        continue;
                    }
                    Ok(Ok(conn)) => conn,
                };
                let control = Arc::clone(&control);
                let tx = worker_tx.clone();
                tokio::spawn(async move {
                    match handshake(stream, control.as_raw_fd(), handshake_timeout).await {
                        Ok(event) => {
                            debug!(pid = event.handle.pid(), "worker handshake complete");
                            let _ = tx.send(event).await;
                        }
                        Err(e) => warn!(error = %e, "worker handshake failed"),
                    }
                });
            }
        }
    }
}

/// Perform one handshake: descriptor out, PID line in.
///
/// The blocking ancillary send and deadline-bounded PID read run on the
/// blocking pool; the stream returns to the runtime afterwards.
async fn handshake(
    stream: tokio::net::UnixStream,
    listener_fd: std::os::fd::RawFd,
    timeout: Duration,
) -> Result<WorkerEvent, HandshakeError> {
    let stream = stream.into_std()?;
    let (stream, pid) = tokio::task::spawn_blocking(
        move || -> Result<(std::os::unix::net::UnixStream, i32), HandshakeError> {
            stream.set_nonblocking(false)?;
            fdpass::send_listener(&stream, listener_fd)?;
            stream.set_read_timeout(Some(timeout))?;
            let pid = read_pid_line(&stream)?;
            stream.set_nonblocking(true)?;
            Ok((stream, pid))
        },
    )
    .await
    .map_err(|_| HandshakeError::Task)??;

    let stream = tokio::net::UnixStream::from_std(stream)?;
    let (reader, writer) = stream.into_split();
    let handle = Arc::new(WorkerHandle::new(pid, writer));
    Ok(WorkerEvent { handle, reader })
}

/// Read the decimal PID line byte-by-byte so no bytes past the terminator
/// are consumed from the stream.
fn read_pid_line(mut stream: &std::os::unix::net::UnixStream) -> Result<i32, HandshakeError> {
    let mut line = Vec::with_capacity(16);
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => return Err(HandshakeError::MissingPid),
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => {
                if line.len() >= 16 {
                    return Err(HandshakeError::InvalidPid(
                        String::from_utf8_lossy(&line).into_owned(),
                    ));
                }
                line.push(byte[0]);
            }
            Err(e) => return Err(HandshakeError::Io(e)),
        }
    }
    let text = String::from_utf8_lossy(&line);
    text.trim()
        .parse::<i32>()
        .map_err(|_| HandshakeError::InvalidPid(text.into_owned()))
}

/// Accept loop for operator connections on the control listener.
async fn run_control_accept(
    control: Arc<TcpListener>,
    event_tx: mpsc::Sender<OperatorEvent>,
    cancel: CancellationToken,
    accept_deadline: Duration,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("control accept loop stopped");
                return;
            }
            accepted = tokio::time::timeout(accept_deadline, control.accept()) => {
                let (stream, addr) = match accepted {
                    Err(_) => continue,
                    Ok(Err(e)) => {
                        error!(error = %e, "control accept error");
                        continue;
                    }
                    Ok(Ok(conn)) => conn,
                };
                debug!(peer = %addr, "operator connected");
                tokio::spawn(handle_operator_conn(stream, addr, event_tx.clone(), cancel.clone()));
            }
        }
    }
}

/// Per-connection reader: every non-empty line becomes an event.
async fn handle_operator_conn(
    stream: TcpStream,
    addr: SocketAddr,
    event_tx: mpsc::Sender<OperatorEvent>,
    cancel: CancellationToken,
) {
    let source = addr.to_string();
    let (read_half, write_half) = stream.into_split();
    let reply = Reply::new(write_half, source.clone());
    let mut lines = BufReader::new(read_half).lines();
    let clock = SystemClock;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!(peer = %source, "operator disconnected");
                        return;
                    }
                    Err(e) => {
                        debug!(peer = %source, error = %e, "operator read error");
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let frame = match parse_operator_line(&line) {
                    OperatorLine::Frame(msg) => *msg,
                    OperatorLine::Bare(cmd) => MessagePayload::new(MASTER_PID, cmd, &clock),
                };
                let event = OperatorEvent { source: source.clone(), frame, reply: reply.clone() };
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker controller: the peer side of the handshake.
//!
//! Dials the master's Unix socket, receives the listener descriptor,
//! rebuilds the listener and serves on it, then obeys the master's command
//! stream until SHUTDOWN or master loss.

pub mod proxy;
pub mod serve;

use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use handoff_core::{CommandFrame, MessagePayload, MsgType, SystemClock, WorkerState};
use handoff_wire::ProtocolError;
use thiserror::Error;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::fdpass::{self, FdKind};

/// Worker-side failures. All of them exit the worker non-zero.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("cannot dial master at {path}: {source}")]
    Dial { path: PathBuf, source: io::Error },

    #[error(transparent)]
    FdPass(#[from] fdpass::FdPassError),

    #[error("inherited descriptor is not a socket (got {0})")]
    NotASocket(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("handshake task aborted")]
    Task,
}

/// Run the worker until SHUTDOWN (exit code 0), master loss or proxy
/// failure (exit code 1).
pub async fn run(config: WorkerConfig) -> Result<i32, WorkerError> {
    let pid = std::process::id() as i32;
    let mut state = WorkerState::Starting;
    debug!(pid, state = %state, "worker starting");

    let (stream, fd, greeting) = dial_and_handshake(config.socket_path.clone(), pid).await?;
    info!(pid, greeting = %String::from_utf8_lossy(&greeting), fd, "handshake complete");

    let listener = fdpass::rebuild_listener(fd)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;
    if let Ok(addr) = listener.local_addr() {
        info!(pid, addr = %addr, "serving on inherited listener");
    }

    stream.set_nonblocking(true)?;
    let stream = tokio::net::UnixStream::from_std(stream)?;
    let (read_half, mut write_half) = stream.into_split();

    let serve_cancel = CancellationToken::new();
    let proxy = match &config.proxy {
        Some(proxy_config) => Some(proxy::spawn(proxy_config, listener.as_raw_fd(), pid)?),
        None => None,
    };
    let proxy_failed = proxy
        .as_ref()
        .map(|p| p.failed_token())
        .unwrap_or_else(CancellationToken::new);
    let has_proxy = proxy.is_some();
    let server = tokio::spawn(serve::serve(listener, pid, serve_cancel.clone()));

    state = WorkerState::Connected;
    debug!(pid, state = %state, "entering command loop");

    let mut reader = BufReader::new(read_half);
    let clock = SystemClock;
    let exit_code = loop {
        tokio::select! {
            _ = proxy_failed.cancelled(), if has_proxy => {
                warn!(pid, "proxy child failed");
                break 1;
            }
            result = handoff_wire::read_frame(&mut reader) => match result {
                Ok(msg) => match msg.kind() {
                    MsgType::Shutdown => {
                        info!(pid, "shutdown received");
                        break 0;
                    }
                    MsgType::Drain => {
                        run_drain(&config, &msg.payload.data).await;
                        state = WorkerState::Idle;
                        debug!(pid, state = %state, "drained");
                    }
                    MsgType::Ping => {
                        let pong = MessagePayload::new(
                            pid,
                            CommandFrame::new(MsgType::Pong).with_data(msg.id),
                            &clock,
                        );
                        if let Err(e) = handoff_wire::write_frame(&mut write_half, &pong).await {
                            warn!(pid, error = %e, "pong not delivered");
                        }
                    }
                    kind => debug!(pid, kind = %kind, "ignoring frame"),
                },
                Err(ProtocolError::ConnectionClosed) => {
                    warn!(pid, "master connection lost");
                    break 1;
                }
                Err(e) => {
                    warn!(pid, error = %e, "command stream error");
                    break 1;
                }
            }
        }
    };

    // Graceful teardown: stop accepting, let in-flight requests finish
    // within the grace period, terminate the proxy child.
    serve_cancel.cancel();
    if let Some(proxy) = proxy {
        proxy.stop().await;
    }
    if tokio::time::timeout(config.grace_timeout, server).await.is_err() {
        warn!(pid, "grace period elapsed with requests in flight");
    }
    info!(pid, exit_code, "worker stopped");
    Ok(exit_code)
}

/// Blocking dial + handshake on the blocking pool: receive the descriptor,
/// verify it is a socket, report our PID.
async fn dial_and_handshake(
    path: PathBuf,
    pid: i32,
) -> Result<(std::os::unix::net::UnixStream, std::os::fd::RawFd, Vec<u8>), WorkerError> {
    tokio::task::spawn_blocking(move || {
        let mut stream = std::os::unix::net::UnixStream::connect(&path)
            .map_err(|source| WorkerError::Dial { path: path.clone(), source })?;
        let (fd, greeting) = fdpass::recv_listener(&stream)?;

        match fdpass::inspect_fd(fd) {
            Ok(FdKind::Socket) => {}
            Ok(kind) => {
                let _ = nix::unistd::close(fd);
                return Err(WorkerError::NotASocket(kind.describe()));
            }
            Err(e) => {
                let _ = nix::unistd::close(fd);
                return Err(WorkerError::FdPass(e));
            }
        }

        stream.write_all(format!("{pid}\n").as_bytes())?;
        Ok((stream, fd, greeting))
    })
    .await
    .map_err(|_| WorkerError::Task)?
}

/// Execute a DRAIN: write the admin command to the configured proxy admin
/// socket, or log it when none is configured.
async fn run_drain(config: &WorkerConfig, command: &str) {
    match &config.admin_socket {
        Some(path) => match proxy::send_admin_command(path, command).await {
            Ok(()) => info!(command, path = %path.display(), "drain command executed"),
            Err(e) => warn!(command, error = %e, "drain command failed"),
        },
        None => info!(command, "drain requested; no admin socket configured"),
    }
}

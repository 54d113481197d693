// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auxiliary proxy child supervision.
//!
//! A worker may run an external proxy (e.g. haproxy) in front of the
//! inherited listener. The child gets the listener as fd 3 and the
//! coordinates in its environment; its stdout/stderr stay on the worker's
//! so logs are captured together. A non-zero child exit takes the worker
//! down with it.

use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fd number the child sees the inherited listener at.
const CHILD_LISTENER_FD: RawFd = 3;

/// How long SIGTERM gets before SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// Configuration for the proxy child.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
    /// Exposed to the child as `APP_VERSION`.
    pub version_marker: String,
}

/// A running proxy child and its watcher task.
pub struct ProxyChild {
    child_pid: Option<u32>,
    failed: CancellationToken,
    stop_tx: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<()>,
}

/// Spawn the proxy with the inherited listener mapped to fd 3.
#[allow(unsafe_code)]
pub fn spawn(config: &ProxyConfig, listener_fd: RawFd, worker_pid: i32) -> io::Result<ProxyChild> {
    let mut command = Command::new(&config.command);
    command
        .args(&config.args)
        .env("FD_ORDER", CHILD_LISTENER_FD.to_string())
        .env("PID", worker_pid.to_string())
        .env("APP_VERSION", &config.version_marker)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    // SAFETY: the hook runs post-fork, pre-exec; it only calls async-signal-
    // safe fd syscalls. dup2 clears CLOEXEC on the child-side fd.
    unsafe {
        command.pre_exec(move || {
            if listener_fd == CHILD_LISTENER_FD {
                nix::fcntl::fcntl(
                    listener_fd,
                    nix::fcntl::FcntlArg::F_SETFD(nix::fcntl::FdFlag::empty()),
                )
                .map_err(io::Error::from)?;
            } else {
                nix::unistd::dup2(listener_fd, CHILD_LISTENER_FD).map_err(io::Error::from)?;
            }
            Ok(())
        });
    }

    let child = command.spawn()?;
    let child_pid = child.id();
    info!(command = %config.command.display(), child_pid, "proxy child started");

    let failed = CancellationToken::new();
    let (stop_tx, stop_rx) = oneshot::channel();
    let watcher = tokio::spawn(watch(child, failed.clone(), stop_rx));

    Ok(ProxyChild { child_pid, failed, stop_tx: Some(stop_tx), watcher })
}

/// Reap the child; on request, terminate it gracefully instead.
async fn watch(
    mut child: tokio::process::Child,
    failed: CancellationToken,
    mut stop_rx: oneshot::Receiver<()>,
) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => info!("proxy child exited cleanly"),
            Ok(status) => {
                warn!(code = status.code().unwrap_or(-1), "proxy child terminated abnormally");
                failed.cancel();
            }
            Err(e) => {
                warn!(error = %e, "proxy child reap failed");
                failed.cancel();
            }
        },
        _ = &mut stop_rx => {
            if let Some(pid) = child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
            match tokio::time::timeout(TERM_GRACE, child.wait()).await {
                Ok(status) => info!(status = ?status.ok(), "proxy child stopped"),
                Err(_) => {
                    warn!("proxy child ignored SIGTERM, killing");
                    let _ = child.kill().await;
                }
            }
        }
    }
}

impl ProxyChild {
    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    /// Token cancelled when the child terminates abnormally.
    pub fn failed_token(&self) -> CancellationToken {
        self.failed.clone()
    }

    /// Terminate the child gracefully and wait for the watcher.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.watcher.await;
    }
}

/// Write one admin command line to the proxy's admin socket.
pub async fn send_admin_command(path: &Path, command: &str) -> io::Result<()> {
    let mut stream = tokio::net::UnixStream::connect(path).await?;
    stream.write_all(command.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;

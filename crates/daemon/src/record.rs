// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master-side worker records.
//!
//! [`WorkerProcess`] is the capability surface the registry, bus and
//! orchestrator operate on; [`WorkerHandle`] is the concrete record built
//! by the gateway after a successful handshake. Tests substitute a stub.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use handoff_core::{
    Clock, CommandFrame, MessagePayload, MsgType, SystemClock, WorkerState, MASTER_PID,
};
use handoff_wire::ProtocolError;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Errors from sending to a worker record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("worker {pid} has no active connection")]
    NoConnection { pid: i32 },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Capability surface of a worker-like object.
#[async_trait]
pub trait WorkerProcess: Send + Sync {
    fn pid(&self) -> i32;
    fn state(&self) -> WorkerState;

    fn is_alive(&self) -> bool {
        self.state() == WorkerState::Connected
    }

    /// Complete registration: deliver the opening ping and mark the record
    /// Connected.
    async fn start(&self) -> Result<(), RecordError>;

    /// Instruct the worker to stop taking new work; `command` is the admin
    /// action its embedded proxy executes.
    async fn drain(&self, command: &str) -> Result<(), RecordError>;

    /// Mark the record Disconnected and best-effort deliver a SHUTDOWN
    /// frame. Removal happens on the next health sweep.
    async fn shutdown(&self);

    async fn send(&self, msg: &MessagePayload) -> Result<usize, RecordError>;
}

/// Concrete record for a handshaken worker connection.
pub struct WorkerHandle {
    pid: i32,
    state: parking_lot::Mutex<WorkerState>,
    // One writer at a time per record; frame order on the connection is the
    // lock acquisition order.
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    last_pong_ms: AtomicU64,
    clock: SystemClock,
}

impl WorkerHandle {
    pub fn new(pid: i32, writer: OwnedWriteHalf) -> Self {
        Self {
            pid,
            state: parking_lot::Mutex::new(WorkerState::Connecting),
            writer: tokio::sync::Mutex::new(writer),
            last_pong_ms: AtomicU64::new(0),
            clock: SystemClock,
        }
    }

    pub fn mark_disconnected(&self) {
        *self.state.lock() = WorkerState::Disconnected;
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
    }

    fn note_pong(&self) {
        self.last_pong_ms.store(self.clock.epoch_ms(), Ordering::Relaxed);
    }

    /// Epoch-ms of the most recent PONG, 0 before the first one.
    pub fn last_pong_ms(&self) -> u64 {
        self.last_pong_ms.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WorkerProcess for WorkerHandle {
    fn pid(&self) -> i32 {
        self.pid
    }

    fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    async fn start(&self) -> Result<(), RecordError> {
        let ping = MessagePayload::command(MsgType::Ping, MASTER_PID, &self.clock);
        match self.send(&ping).await {
            Ok(_) => {
                self.set_state(WorkerState::Connected);
                debug!(pid = self.pid, "worker record connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(WorkerState::Error);
                Err(e)
            }
        }
    }

    async fn drain(&self, command: &str) -> Result<(), RecordError> {
        let msg = MessagePayload::new(
            self.pid,
            CommandFrame::new(MsgType::Drain).with_data(command),
            &self.clock,
        );
        self.send(&msg).await?;
        debug!(pid = self.pid, command, "drain command sent");
        Ok(())
    }

    async fn shutdown(&self) {
        self.mark_disconnected();
        let msg = MessagePayload::command(MsgType::Shutdown, MASTER_PID, &self.clock);
        if let Err(e) = self.send(&msg).await {
            warn!(pid = self.pid, error = %e, "shutdown frame not delivered");
        }
    }

    async fn send(&self, msg: &MessagePayload) -> Result<usize, RecordError> {
        let mut writer = self.writer.lock().await;
        let n = handoff_wire::write_frame(&mut *writer, msg).await?;
        trace!(pid = self.pid, bytes = n, kind = %msg.kind(), "frame sent to worker");
        Ok(n)
    }
}

/// Reader task for one worker connection: consumes PONG replies and marks
/// the record Disconnected when the stream ends.
pub async fn run_reader(
    handle: std::sync::Arc<WorkerHandle>,
    read_half: OwnedReadHalf,
    cancel: CancellationToken,
) {
    let mut reader = BufReader::new(read_half);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            result = handoff_wire::read_frame(&mut reader) => match result {
                Ok(msg) if msg.kind() == MsgType::Pong => {
                    handle.note_pong();
                    trace!(pid = handle.pid(), ping_id = %msg.payload.data, "pong received");
                }
                Ok(msg) => {
                    debug!(pid = handle.pid(), kind = %msg.kind(), "unexpected frame from worker");
                }
                Err(ProtocolError::ConnectionClosed) => {
                    debug!(pid = handle.pid(), "worker stream closed");
                    handle.mark_disconnected();
                    return;
                }
                Err(e) => {
                    warn!(pid = handle.pid(), error = %e, "worker stream error");
                    handle.mark_disconnected();
                    return;
                }
            }
        }
    }
}

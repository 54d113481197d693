// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared stubs for daemon unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use handoff_core::{MessagePayload, WorkerState};
use parking_lot::Mutex;

use crate::record::{RecordError, WorkerProcess};

/// In-memory worker record that captures everything sent to it.
pub(crate) struct StubWorker {
    pid: i32,
    state: Mutex<WorkerState>,
    pub sent: Mutex<Vec<MessagePayload>>,
    pub fail_sends: AtomicBool,
    pub shutdown_calls: AtomicUsize,
}

impl StubWorker {
    pub fn connected(pid: i32) -> Arc<Self> {
        Arc::new(Self {
            pid,
            state: Mutex::new(WorkerState::Connected),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            shutdown_calls: AtomicUsize::new(0),
        })
    }

    pub fn disconnected(pid: i32) -> Arc<Self> {
        let stub = Self::connected(pid);
        *stub.state.lock() = WorkerState::Disconnected;
        stub
    }

    pub fn failing(pid: i32) -> Arc<Self> {
        let stub = Self::connected(pid);
        stub.fail_sends.store(true, Ordering::Relaxed);
        stub
    }

    pub fn sent_kinds(&self) -> Vec<handoff_core::MsgType> {
        self.sent.lock().iter().map(|m| m.kind()).collect()
    }
}

#[async_trait]
impl WorkerProcess for StubWorker {
    fn pid(&self) -> i32 {
        self.pid
    }

    fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    async fn start(&self) -> Result<(), RecordError> {
        *self.state.lock() = WorkerState::Connected;
        Ok(())
    }

    async fn drain(&self, command: &str) -> Result<(), RecordError> {
        let clock = handoff_core::SystemClock;
        let msg = MessagePayload::new(
            self.pid,
            handoff_core::CommandFrame::new(handoff_core::MsgType::Drain).with_data(command),
            &clock,
        );
        self.send(&msg).await.map(|_| ())
    }

    async fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::Relaxed);
        *self.state.lock() = WorkerState::Disconnected;
    }

    async fn send(&self, msg: &MessagePayload) -> Result<usize, RecordError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(RecordError::NoConnection { pid: self.pid });
        }
        self.sent.lock().push(msg.clone());
        Ok(1)
    }
}

/// Minimal `SystemCore` for dispatcher tests.
pub(crate) struct FakeCore {
    pub drains: Mutex<Vec<i32>>,
    pub workers: usize,
}

impl FakeCore {
    pub fn new(workers: usize) -> Arc<Self> {
        Arc::new(Self { drains: Mutex::new(Vec::new()), workers })
    }
}

#[async_trait]
impl crate::orchestrator::SystemCore for FakeCore {
    fn check_health(&self) -> &'static str {
        "HEALTHY"
    }

    fn total_workers(&self) -> usize {
        self.workers
    }

    async fn drain(&self, pid: i32) {
        self.drains.lock().push(pid);
    }

    fn scale_up(&self) {}
    fn scale_down(&self) {}
}

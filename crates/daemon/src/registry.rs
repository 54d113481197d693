// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The master's in-memory worker registry.
//!
//! Mutations run under the exclusive lock; enumeration snapshots the map
//! under the shared lock and iterates lock-free. A record that fails a
//! send is only *marked* Disconnected; removal happens in the periodic
//! sweep so a dead worker never stalls a broadcast.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use handoff_core::{CommandFrame, MessagePayload, MsgType, SystemClock, MASTER_PID};
use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::bus::EventBus;
use crate::record::WorkerProcess;

/// Errors from registry mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no worker found to remove")]
    UnknownWorker,
}

/// Mapping PID → worker record.
pub struct WorkerRegistry {
    workers: RwLock<HashMap<i32, Arc<dyn WorkerProcess>>>,
    bus: EventBus,
    clock: SystemClock,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self { workers: RwLock::new(HashMap::new()), bus: EventBus, clock: SystemClock }
    }

    /// Insert a record, replacing any existing entry for the same PID.
    /// A duplicate PID is a reconnection.
    pub fn add(&self, worker: Arc<dyn WorkerProcess>) {
        let pid = worker.pid();
        let mut workers = self.workers.write();
        if workers.insert(pid, worker).is_some() {
            debug!(pid, "replaced record for reconnected worker");
        }
        debug!(pid, total = workers.len(), "worker added to registry");
    }

    pub fn remove(&self, pid: i32) -> Result<(), RegistryError> {
        match self.workers.write().remove(&pid) {
            Some(_) => Ok(()),
            None => Err(RegistryError::UnknownWorker),
        }
    }

    pub fn get(&self, pid: i32) -> Option<Arc<dyn WorkerProcess>> {
        self.workers.read().get(&pid).cloned()
    }

    /// Snapshot of the current records, safe to iterate without the lock.
    pub fn get_all(&self) -> Vec<Arc<dyn WorkerProcess>> {
        self.workers.read().values().cloned().collect()
    }

    pub fn total(&self) -> usize {
        self.workers.read().len()
    }

    /// Broadcast a CHAT frame to every record.
    pub async fn broadcast(&self, text: &str) {
        let msg = MessagePayload::new(
            MASTER_PID,
            CommandFrame::new(MsgType::Chat).with_data(text),
            &self.clock,
        );
        self.bus.broadcast(&msg, &self.get_all()).await;
    }

    /// Ping every record with a master-originated frame.
    async fn ping_workers(&self) {
        let ping = MessagePayload::command(MsgType::Ping, MASTER_PID, &self.clock);
        self.bus.broadcast(&ping, &self.get_all()).await;
    }

    /// Remove every record in state Disconnected, under the exclusive lock.
    pub fn sweep(&self) {
        let mut workers = self.workers.write();
        workers.retain(|pid, worker| {
            let keep = !worker.state().is_disconnected();
            if !keep {
                info!(pid, "worker removed");
            }
            keep
        });
    }

    /// Health loop: each tick pings every record, then sweeps.
    pub async fn run_health_loop(&self, tick: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {
                    self.ping_workers().await;
                    self.sweep();
                }
            }
        }
    }

    /// Shut down every record and clear the map; used at master shutdown.
    pub async fn close_all(&self) {
        let workers = self.get_all();
        debug!(total = workers.len(), "closing all worker connections");
        for worker in workers {
            info!(pid = worker.pid(), "closing connection");
            worker.shutdown().await;
        }
        self.workers.write().clear();
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

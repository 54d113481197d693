// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Send-one and broadcast-to-all semantics over worker records.

use std::sync::Arc;

use handoff_core::MessagePayload;
use tracing::{debug, trace, warn};

use crate::record::{RecordError, WorkerProcess};

/// Message fan-out over a snapshot of worker records.
///
/// Sends are sequential per broadcast; each record's own writer lock bounds
/// concurrent writes per connection to one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventBus;

impl EventBus {
    /// Send one frame to one record.
    pub async fn send(
        &self,
        msg: &MessagePayload,
        worker: &Arc<dyn WorkerProcess>,
    ) -> Result<usize, RecordError> {
        let n = worker.send(msg).await?;
        trace!(pid = worker.pid(), bytes = n, "frame delivered");
        Ok(n)
    }

    /// Send one frame to every record in the snapshot.
    ///
    /// Disconnected records are skipped; a failed send shuts the record
    /// down and the broadcast continues. A single dead peer never fails
    /// the broadcast.
    pub async fn broadcast(&self, msg: &MessagePayload, workers: &[Arc<dyn WorkerProcess>]) {
        for worker in workers {
            if worker.state().is_disconnected() {
                debug!(pid = worker.pid(), "skipping disconnected record");
                continue;
            }
            if let Err(e) = self.send(msg, worker).await {
                warn!(pid = worker.pid(), error = %e, kind = %msg.kind(), "send failed, shutting record down");
                worker.shutdown().await;
            }
        }
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Business-facing orchestration over the registry and bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::registry::WorkerRegistry;

/// Operations the command handlers run against the system.
#[async_trait]
pub trait SystemCore: Send + Sync {
    /// `"HEALTHY"` while the gateway is running, `"NOT HEALTHY"` after it
    /// closed. Liveness probes use this string verbatim.
    fn check_health(&self) -> &'static str;

    fn total_workers(&self) -> usize;

    /// Drain one worker. An absent PID logs and no-ops.
    async fn drain(&self, pid: i32);

    /// Reserved scale hooks.
    fn scale_up(&self);
    fn scale_down(&self);
}

/// The concrete orchestrator wired to the registry and gateway.
pub struct Orchestrator {
    registry: Arc<WorkerRegistry>,
    gateway_running: Arc<AtomicBool>,
    drain_command: String,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        gateway_running: Arc<AtomicBool>,
        drain_command: String,
    ) -> Self {
        Self { registry, gateway_running, drain_command }
    }
}

#[async_trait]
impl SystemCore for Orchestrator {
    fn check_health(&self) -> &'static str {
        if self.gateway_running.load(Ordering::Relaxed) {
            "HEALTHY"
        } else {
            "NOT HEALTHY"
        }
    }

    fn total_workers(&self) -> usize {
        self.registry.total()
    }

    async fn drain(&self, pid: i32) {
        let Some(worker) = self.registry.get(pid) else {
            info!(pid, "drain requested for unknown worker");
            return;
        };
        if let Err(e) = worker.drain(&self.drain_command).await {
            warn!(pid, error = %e, "drain delivery failed");
        }
    }

    fn scale_up(&self) {
        debug!("scale up requested; hook not implemented");
    }

    fn scale_down(&self) {
        debug!("scale down requested; hook not implemented");
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker connection lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a worker connection as tracked by either side.
///
/// A master-side record starts in `Connecting` and becomes `Connected`
/// once the handshake completed and the opening ping was delivered.
/// `Disconnected` records are skipped by broadcasts and removed by the
/// next health sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Disconnected,
    Connected,
    Connecting,
    Starting,
    Error,
    Retrying,
    Idle,
}

impl WorkerState {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, WorkerState::Disconnected)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Disconnected => "disconnected",
            WorkerState::Connected => "connected",
            WorkerState::Connecting => "connecting",
            WorkerState::Starting => "starting",
            WorkerState::Error => "error",
            WorkerState::Retrying => "retrying",
            WorkerState::Idle => "idle",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

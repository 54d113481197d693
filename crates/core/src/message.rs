// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control messages exchanged between master and workers.
//!
//! A [`MessagePayload`] is the unit that crosses the wire, on both the
//! operator TCP socket and the per-worker Unix stream. The framing itself
//! (newline-delimited JSON) lives in `handoff-wire`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::Clock;

/// `from_pid` value for frames originated by the master itself.
pub const MASTER_PID: i32 = -1;

/// Kind of control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MsgType {
    Shutdown,
    Drain,
    Ping,
    Pong,
    Chat,
    EventStats,
    ConfigReload,
}

impl MsgType {
    /// Display name, matching the wire encoding.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MsgType::Shutdown => "SHUTDOWN",
            MsgType::Drain => "DRAIN",
            MsgType::Ping => "PING",
            MsgType::Pong => "PONG",
            MsgType::Chat => "CHAT",
            MsgType::EventStats => "EVENT_STATS",
            MsgType::ConfigReload => "CONFIG_RELOAD",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command carried inside a [`MessagePayload`].
///
/// `name`, `description` and `usage` are human-facing metadata used by the
/// command registry for help output; `data` is interpreted by the handler
/// for the given kind (chat text, the drain admin command, a ping id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFrame {
    #[serde(rename = "type")]
    pub kind: MsgType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

impl CommandFrame {
    pub fn new(kind: MsgType) -> Self {
        Self { kind, name: None, description: None, usage: None, data: String::new() }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The wire unit: one frame per line on every control stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Globally unique message id.
    pub id: String,
    /// Originator PID; [`MASTER_PID`] for master-originated frames.
    pub from_pid: i32,
    /// Epoch-milliseconds at send time. Ordering is only meaningful
    /// within a single master/worker pair.
    pub timestamp: u64,
    pub payload: CommandFrame,
}

impl MessagePayload {
    /// Build a new message with a fresh id and the clock's current time.
    pub fn new(from_pid: i32, payload: CommandFrame, clock: &impl Clock) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from_pid,
            timestamp: clock.epoch_ms(),
            payload,
        }
    }

    /// Shorthand for a bare command of the given kind.
    pub fn command(kind: MsgType, from_pid: i32, clock: &impl Clock) -> Self {
        Self::new(from_pid, CommandFrame::new(kind), clock)
    }

    pub fn kind(&self) -> MsgType {
        self.payload.kind
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

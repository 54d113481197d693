// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator line parsing.
//!
//! The operator TCP socket is line-oriented and accepts both full JSON
//! frames and bare text commands (`status`, `broadcast hello`, ...). A bare
//! line is split into a command name (first token) and argument data (the
//! rest); the gateway wraps it into a full message before dispatch.

use handoff_core::{CommandFrame, MessagePayload, MsgType};

/// One parsed operator line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorLine {
    /// The line was a complete JSON frame.
    Frame(Box<MessagePayload>),
    /// The line was bare text; `name` is the first token, uppercased by
    /// the dispatcher at lookup time.
    Bare(CommandFrame),
}

/// Parse one non-empty operator line.
pub fn parse_operator_line(line: &str) -> OperatorLine {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        if let Ok(msg) = serde_json::from_str::<MessagePayload>(trimmed) {
            return OperatorLine::Frame(Box::new(msg));
        }
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (trimmed, ""),
    };
    OperatorLine::Bare(CommandFrame::new(MsgType::Ping).with_name(name).with_data(rest))
}

#[cfg(test)]
#[path = "operator_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator command dispatch.
//!
//! Maps command names (case-insensitive) to async handlers. The master
//! routes every operator event through [`CommandRegistry::execute`];
//! handler errors are written back on the operator connection and the
//! master keeps running.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use handoff_core::MessagePayload;
use parking_lot::RwLock;
use thiserror::Error;

use crate::gateway::Reply;
use crate::orchestrator::SystemCore;

/// Errors surfaced to the operator connection.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0}")]
    Handler(String),
}

/// Human-facing metadata for a registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub usage: String,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send>>;

/// Async handler: `(system core, frame, reply writer)`.
pub type CommandHandler =
    Arc<dyn Fn(Arc<dyn SystemCore>, MessagePayload, Reply) -> HandlerFuture + Send + Sync>;

struct RegisteredCommand {
    spec: CommandSpec,
    handler: CommandHandler,
}

/// Thread-safe name → handler registry.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, RegisteredCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Names are normalized to uppercase so lookup is
    /// case-insensitive; re-registering a name replaces the handler.
    pub fn register(
        &self,
        name: &str,
        description: &str,
        usage: &str,
        handler: CommandHandler,
    ) {
        let spec = CommandSpec {
            name: name.to_uppercase(),
            description: description.to_string(),
            usage: usage.to_string(),
        };
        self.commands
            .write()
            .insert(spec.name.clone(), RegisteredCommand { spec, handler });
    }

    /// Registered command metadata, sorted by name. Used for help output.
    pub fn specs(&self) -> Vec<CommandSpec> {
        let mut specs: Vec<_> =
            self.commands.read().values().map(|c| c.spec.clone()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Route one operator frame to its handler.
    pub async fn execute(
        &self,
        core: Arc<dyn SystemCore>,
        frame: MessagePayload,
        reply: Reply,
    ) -> Result<(), DispatchError> {
        let name = frame.payload.name.clone().unwrap_or_default();
        let handler = {
            let commands = self.commands.read();
            commands.get(&name.to_uppercase()).map(|c| Arc::clone(&c.handler))
        };

        let Some(handler) = handler else {
            reply.write_line(&format!("Unknown command: {name}")).await;
            return Err(DispatchError::UnknownCommand(name));
        };

        if let Err(e) = handler(core, frame, reply.clone()).await {
            reply.write_line(&e.to_string()).await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

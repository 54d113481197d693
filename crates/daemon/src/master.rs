// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master controller: assembles gateway, registry, dispatcher and
//! orchestrator, and runs the event loops between them.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MasterConfig;
use crate::dispatch::{CommandRegistry, DispatchError};
use crate::gateway::{GatewayError, IpcGateway, OperatorEvent, WorkerEvent};
use crate::orchestrator::{Orchestrator, SystemCore};
use crate::record::{self, WorkerProcess};
use crate::registry::WorkerRegistry;

/// Fatal startup errors. The operator surface exits non-zero on these.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// The running master.
pub struct Master {
    registry: Arc<WorkerRegistry>,
    orchestrator: Arc<Orchestrator>,
    gateway: IpcGateway,
    cancel: CancellationToken,
}

impl Master {
    /// Bind the gateway and spawn the master's event loops.
    pub async fn start(config: MasterConfig) -> Result<Self, LifecycleError> {
        let cancel = CancellationToken::new();
        let (gateway, worker_rx, event_rx) = IpcGateway::start(&config, &cancel).await?;

        let registry = Arc::new(WorkerRegistry::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&registry),
            gateway.running_flag(),
            config.drain_command.clone(),
        ));
        let commands = builtin_commands(&registry, &cancel);

        tokio::spawn(dispatch_operator_events(
            event_rx,
            Arc::clone(&commands),
            Arc::clone(&orchestrator) as Arc<dyn SystemCore>,
            cancel.clone(),
        ));
        tokio::spawn(register_workers(worker_rx, Arc::clone(&registry), cancel.clone()));
        {
            let registry = Arc::clone(&registry);
            let cancel = cancel.clone();
            let tick = config.health_tick;
            tokio::spawn(async move { registry.run_health_loop(tick, cancel).await });
        }

        info!("master running");
        Ok(Self { registry, orchestrator, gateway, cancel })
    }

    /// Bound control address.
    pub fn control_addr(&self) -> std::net::SocketAddr {
        self.gateway.local_addr()
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Root cancellation token; fires on `shutdown` and on the operator
    /// `exit` command.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait until shutdown is requested.
    pub async fn run_until_cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Shut every worker down, close the gateway, cancel all tasks.
    pub async fn shutdown(&self) {
        info!("master shutting down");
        self.registry.close_all().await;
        self.gateway.close();
        self.cancel.cancel();
    }
}

/// Forward operator events into the command registry.
async fn dispatch_operator_events(
    mut event_rx: mpsc::Receiver<OperatorEvent>,
    commands: Arc<CommandRegistry>,
    core: Arc<dyn SystemCore>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            event = event_rx.recv() => {
                let Some(OperatorEvent { source, frame, reply }) = event else { return };
                debug!(source = %source, name = frame.payload.name.as_deref().unwrap_or(""), "operator command");
                if let Err(e) = commands.execute(Arc::clone(&core), frame, reply).await {
                    warn!(source = %source, error = %e, "command dispatch failed");
                }
            }
        }
    }
}

/// Consume handshaken workers: opening ping, then into the registry.
async fn register_workers(
    mut worker_rx: mpsc::Receiver<WorkerEvent>,
    registry: Arc<WorkerRegistry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            event = worker_rx.recv() => {
                let Some(WorkerEvent { handle, reader }) = event else { return };
                let pid = handle.pid();
                if let Err(e) = handle.start().await {
                    warn!(pid, error = %e, "opening ping failed, worker not registered");
                    continue;
                }
                registry.add(Arc::clone(&handle) as Arc<dyn WorkerProcess>);
                tokio::spawn(record::run_reader(handle, reader, cancel.clone()));
            }
        }
    }
}

/// The operator command set.
fn builtin_commands(
    registry: &Arc<WorkerRegistry>,
    cancel: &CancellationToken,
) -> Arc<CommandRegistry> {
    let commands = Arc::new(CommandRegistry::new());

    commands.register(
        "ping",
        "Liveness check",
        "ping",
        Arc::new(|_core, _frame, reply| {
            Box::pin(async move {
                reply.write_line("PONG").await;
                Ok(())
            })
        }),
    );

    commands.register(
        "status",
        "Show the number of registered workers",
        "status",
        Arc::new(|core, _frame, reply| {
            Box::pin(async move {
                reply.write_line(&format!("Active Workers: {}", core.total_workers())).await;
                Ok(())
            })
        }),
    );

    commands.register(
        "health",
        "Report gateway health",
        "health",
        Arc::new(|core, _frame, reply| {
            Box::pin(async move {
                reply.write_line(core.check_health()).await;
                Ok(())
            })
        }),
    );

    {
        let registry = Arc::clone(registry);
        commands.register(
            "broadcast",
            "Send a chat frame to every worker",
            "broadcast <text>",
            Arc::new(move |_core, frame, _reply| {
                let registry = Arc::clone(&registry);
                Box::pin(async move {
                    registry.broadcast(&frame.payload.data).await;
                    Ok(())
                })
            }),
        );
    }

    commands.register(
        "drain",
        "Drain one worker by PID",
        "drain <pid>",
        Arc::new(|core, frame, _reply| {
            Box::pin(async move {
                let pid = frame
                    .payload
                    .data
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| DispatchError::Handler("usage: drain <pid>".to_string()))?;
                core.drain(pid).await;
                Ok(())
            })
        }),
    );

    {
        let weak = Arc::downgrade(&commands);
        commands.register(
            "help",
            "List available commands",
            "help",
            Arc::new(move |_core, _frame, reply| {
                let weak = weak.clone();
                Box::pin(async move {
                    let Some(commands) = weak.upgrade() else { return Ok(()) };
                    for spec in commands.specs() {
                        reply
                            .write_line(&format!(
                                "{} - {} (usage: {})",
                                spec.name, spec.description, spec.usage
                            ))
                            .await;
                    }
                    Ok(())
                })
            }),
        );
    }

    {
        let cancel = cancel.clone();
        commands.register(
            "exit",
            "Stop the master",
            "exit",
            Arc::new(move |_core, _frame, reply| {
                let cancel = cancel.clone();
                Box::pin(async move {
                    reply.write_line("Bye!").await;
                    cancel.cancel();
                    Ok(())
                })
            }),
        );
    }

    commands
}

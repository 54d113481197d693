// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `handoff` - master/worker listener supervisor.
//!
//! `handoff master` runs the supervisor that owns the listening socket;
//! `handoff worker` runs a peer that inherits it over the Unix socket.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use handoff_daemon::{worker, Master, MasterConfig, WorkerConfig};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "handoff", version, about = "Zero-downtime listener supervisor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the master: bind the listener, hand it to workers, take
    /// operator commands on the control socket
    Master {
        /// Unix socket path for worker handshakes
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Control listener address (also the inherited listener)
        #[arg(long)]
        listen: Option<String>,
        /// Append logs to this file instead of stderr
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Start a worker: inherit the listener and serve on it
    Worker {
        /// Unix socket path of the master
        #[arg(long)]
        socket: Option<PathBuf>,
        /// Proxy admin socket DRAIN commands are written to
        #[arg(long)]
        admin_socket: Option<PathBuf>,
    },
}

fn init_tracing(log_file: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("handoff.log"));
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Master { socket, listen, log_file } => {
            let _guard = init_tracing(log_file.as_ref());
            let mut config = MasterConfig::load();
            if let Some(socket) = socket {
                config.socket_path = socket;
            }
            if let Some(listen) = listen {
                config.control_addr = listen;
            }
            run_master(config).await
        }
        Command::Worker { socket, admin_socket } => {
            let _guard = init_tracing(None);
            let mut config = WorkerConfig::load();
            if let Some(socket) = socket {
                config.socket_path = socket;
            }
            if let Some(admin_socket) = admin_socket {
                config.admin_socket = Some(admin_socket);
            }
            run_worker(config).await
        }
    }
}

async fn run_master(config: MasterConfig) -> Result<()> {
    let master = Master::start(config).await?;
    info!(addr = %master.control_addr(), "master ready");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
        _ = sigterm.recv() => info!("termination signal received"),
        _ = master.run_until_cancelled() => {}
    }

    master.shutdown().await;
    Ok(())
}

async fn run_worker(config: WorkerConfig) -> Result<()> {
    match worker::run(config).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "worker failed");
            std::process::exit(1);
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Default Unix socket path for worker handshakes.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/http_mgr.sock";

/// Default control listener address; this is also the listener whose
/// descriptor workers inherit.
pub const DEFAULT_CONTROL_ADDR: &str = "0.0.0.0:1111";

fn duration_ms(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Unix socket path (`HANDOFF_SOCKET_PATH`).
pub fn socket_path() -> PathBuf {
    std::env::var("HANDOFF_SOCKET_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOCKET_PATH))
}

/// Control listener address (`HANDOFF_CONTROL_ADDR`).
pub fn control_addr() -> String {
    std::env::var("HANDOFF_CONTROL_ADDR").unwrap_or_else(|_| DEFAULT_CONTROL_ADDR.to_string())
}

/// Accept deadline for the gateway loops (`HANDOFF_ACCEPT_DEADLINE_MS`,
/// default 5 minutes). Cancellation is observed at the latest when the
/// deadline lapses and the loop re-arms.
pub fn accept_deadline() -> Duration {
    duration_ms("HANDOFF_ACCEPT_DEADLINE_MS", Duration::from_secs(5 * 60))
}

/// Health tick driving worker pings and the disconnect sweep
/// (`HANDOFF_HEALTH_TICK_MS`, default 3s).
pub fn health_tick() -> Duration {
    duration_ms("HANDOFF_HEALTH_TICK_MS", Duration::from_secs(3))
}

/// Deadline for the worker's PID line during the handshake
/// (`HANDOFF_HANDSHAKE_TIMEOUT_MS`, default 1s).
pub fn handshake_timeout() -> Duration {
    duration_ms("HANDOFF_HANDSHAKE_TIMEOUT_MS", Duration::from_secs(1))
}

/// Admin command a worker executes on DRAIN (`HANDOFF_DRAIN_COMMAND`).
pub fn drain_command() -> String {
    std::env::var("HANDOFF_DRAIN_COMMAND")
        .unwrap_or_else(|_| "set server app/backend state drain".to_string())
}

/// Grace period for the worker's HTTP shutdown when the master is lost
/// (`HANDOFF_GRACE_TIMEOUT_MS`, default 30s).
pub fn grace_timeout() -> Duration {
    duration_ms("HANDOFF_GRACE_TIMEOUT_MS", Duration::from_secs(30))
}

/// Optional proxy binary spawned by the worker (`HANDOFF_PROXY_CMD`).
pub fn proxy_cmd() -> Option<PathBuf> {
    std::env::var("HANDOFF_PROXY_CMD").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Arguments for the proxy binary (`HANDOFF_PROXY_ARGS`, whitespace-split).
pub fn proxy_args() -> Vec<String> {
    std::env::var("HANDOFF_PROXY_ARGS")
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Optional admin socket the worker writes DRAIN commands to
/// (`HANDOFF_ADMIN_SOCKET`).
pub fn admin_socket() -> Option<PathBuf> {
    std::env::var("HANDOFF_ADMIN_SOCKET").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Version marker handed to spawned children (`HANDOFF_APP_VERSION`).
pub fn app_version() -> String {
    std::env::var("HANDOFF_APP_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string())
}

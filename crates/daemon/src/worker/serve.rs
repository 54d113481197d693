// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal HTTP responder on the inherited listener.
//!
//! Every request is answered with the serving worker's PID, which makes
//! the kernel's connection distribution directly observable from curl.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{trace, warn};

/// Cap on the request head we read before answering.
const MAX_HEAD: usize = 8 * 1024;

/// Per-request read deadline.
const READ_DEADLINE: Duration = Duration::from_secs(10);

/// Accept loop. On cancellation, stops accepting and waits for in-flight
/// requests; the caller bounds that wait with the grace period.
pub async fn serve(listener: TcpListener, pid: i32, cancel: CancellationToken) {
    let tracker = TaskTracker::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(pid, peer = %peer, "request accepted");
                    tracker.spawn(handle_request(stream, pid));
                }
                Err(e) => {
                    warn!(pid, error = %e, "accept error");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
    tracker.close();
    tracker.wait().await;
}

/// Read the request head (bounded), answer, close.
async fn handle_request(mut stream: TcpStream, pid: i32) {
    let mut head = vec![0u8; MAX_HEAD];
    let mut read = 0;
    let deadline = tokio::time::sleep(READ_DEADLINE);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return,
            n = stream.read(&mut head[read..]) => match n {
                Ok(0) => return,
                Ok(n) => {
                    read += n;
                    if head[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == MAX_HEAD {
                        break;
                    }
                }
                Err(_) => return,
            }
        }
    }

    let body = format!("Request handled by worker PID {pid}\n");
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

#[cfg(test)]
#[path = "serve_tests.rs"]
mod tests;

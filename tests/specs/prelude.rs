// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the integration specs.

use std::io::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use handoff_core::{MessagePayload, MsgType};
use handoff_daemon::{fdpass, Master, MasterConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

pub const DRAIN_COMMAND: &str = "set server app/backend state drain";

/// A master with test-tuned timeouts on a tempdir socket path.
pub struct TestMaster {
    pub master: Master,
    pub socket_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestMaster {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("master.sock");
        let config = MasterConfig {
            socket_path: socket_path.clone(),
            control_addr: "127.0.0.1:0".to_string(),
            accept_deadline: Duration::from_millis(100),
            health_tick: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(1),
            drain_command: DRAIN_COMMAND.to_string(),
        };
        let master = Master::start(config).await.unwrap();
        Self { master, socket_path, _dir: dir }
    }

    pub fn addr(&self) -> SocketAddr {
        self.master.control_addr()
    }

    pub fn total(&self) -> usize {
        self.master.registry().total()
    }
}

/// A worker stand-in that performs the real handshake and keeps the
/// command stream open.
pub struct FakeWorker {
    pub pid: i32,
    pub listener: std::net::TcpListener,
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    _writer: tokio::net::unix::OwnedWriteHalf,
}

impl FakeWorker {
    /// Dial the master's Unix socket, receive the listener descriptor and
    /// report `pid`.
    pub async fn dial(path: &std::path::Path, pid: i32) -> Self {
        let path = path.to_path_buf();
        let (stream, fd) = tokio::task::spawn_blocking(move || {
            let mut stream = std::os::unix::net::UnixStream::connect(&path).unwrap();
            let (fd, greeting) = fdpass::recv_listener(&stream).unwrap();
            assert_eq!(greeting, fdpass::PROCEED);
            stream.write_all(format!("{pid}\n").as_bytes()).unwrap();
            stream.set_nonblocking(true).unwrap();
            (stream, fd)
        })
        .await
        .unwrap();

        let listener = fdpass::rebuild_listener(fd).unwrap();
        let stream = tokio::net::UnixStream::from_std(stream).unwrap();
        let (read_half, write_half) = stream.into_split();
        Self { pid, listener, reader: BufReader::new(read_half), _writer: write_half }
    }

    /// Next frame from the master, or `None` on deadline or stream end.
    pub async fn next_frame(&mut self, deadline: Duration) -> Option<MessagePayload> {
        tokio::time::timeout(deadline, handoff_wire::read_frame(&mut self.reader))
            .await
            .ok()?
            .ok()
    }

    /// Read frames until one of `kind` arrives; panics on deadline.
    pub async fn expect_kind(&mut self, kind: MsgType, deadline: Duration) -> MessagePayload {
        let limit = tokio::time::Instant::now() + deadline;
        loop {
            let remaining = limit.saturating_duration_since(tokio::time::Instant::now());
            match self.next_frame(remaining).await {
                Some(msg) if msg.kind() == kind => return msg,
                Some(_) => continue,
                None => panic!("worker {} saw no {kind} frame within {deadline:?}", self.pid),
            }
        }
    }

    /// Read until the stream ends; panics if it is still open past the
    /// deadline.
    pub async fn expect_eof(&mut self, deadline: Duration) {
        let limit = tokio::time::Instant::now() + deadline;
        loop {
            let remaining = limit.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, handoff_wire::read_frame(&mut self.reader)).await
            {
                Ok(Ok(_)) => continue,
                Ok(Err(_)) => return,
                Err(_) => panic!("worker {} stream still open after {deadline:?}", self.pid),
            }
        }
    }

    /// Assert no frame of `kind` arrives within the window.
    pub async fn assert_no_kind(&mut self, kind: MsgType, window: Duration) {
        let limit = tokio::time::Instant::now() + window;
        loop {
            let remaining = limit.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            if let Some(msg) = self.next_frame(remaining).await {
                assert_ne!(
                    msg.kind(),
                    kind,
                    "worker {} unexpectedly received a {kind} frame",
                    self.pid
                );
            }
        }
    }
}

/// Poll `predicate` until it holds or `max` elapses.
pub async fn wait_for(max: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + max;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Send one operator line and return the first reply line.
pub async fn send_line(addr: SocketAddr, line: &str) -> String {
    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    let mut reader = BufReader::new(conn);
    let mut reply = String::new();
    tokio::time::timeout(Duration::from_secs(1), reader.read_line(&mut reply))
        .await
        .expect("reply within deadline")
        .expect("read reply");
    reply
}

/// Send one operator line without waiting for a reply.
pub async fn send_line_no_reply(addr: SocketAddr, line: &str) {
    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(format!("{line}\n").as_bytes()).await.unwrap();
    conn.flush().await.unwrap();
    // Hold the connection briefly so the gateway reads the line before EOF.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

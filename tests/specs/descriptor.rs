// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end descriptor inheritance: a worker serves connections on the
//! listener the master bound.

use crate::prelude::*;
use std::io::{Read, Write};
use std::time::Duration;

#[tokio::test]
async fn worker_accepts_on_the_masters_listener() {
    let master = TestMaster::start().await;
    let worker = FakeWorker::dial(&master.socket_path, 42).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 1).await);

    // Accept one connection on the inherited copy and answer with a marker.
    let listener = worker.listener.try_clone().unwrap();
    listener.set_nonblocking(false).unwrap();
    let served = std::thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut buf = [0u8; 256];
        let _ = conn.read(&mut buf);
        conn.write_all(b"served-by-worker-42\n").unwrap();
    });

    // The master keeps accepting operator connections on the same
    // listener; the kernel hands each connection to exactly one side, so
    // retry until one lands on the worker.
    let addr = master.addr();
    let mut hit_worker = false;
    for _ in 0..30 {
        let reply = tokio::task::spawn_blocking(move || {
            let mut conn = std::net::TcpStream::connect(addr).unwrap();
            conn.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
            conn.write_all(b"probe\n").unwrap();
            let mut reader = std::io::BufReader::new(conn);
            let mut reply = String::new();
            let _ = std::io::BufRead::read_line(&mut reader, &mut reply);
            reply
        })
        .await
        .unwrap();

        if reply.contains("served-by-worker-42") {
            hit_worker = true;
            break;
        }
        // Landed on the master instead; it answers with the dispatcher's
        // unknown-command line.
        assert!(
            reply.is_empty() || reply.contains("Unknown command"),
            "unexpected reply: {reply:?}"
        );
    }

    assert!(hit_worker, "no probe connection reached the worker's accept");
    served.join().unwrap();
}

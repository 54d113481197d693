// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn answers_with_the_serving_pid() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let server = tokio::spawn(serve(listener, 777, cancel.clone()));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nhost: test\r\n\r\n").await.unwrap();
    let mut response = String::new();
    client.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Request handled by worker PID 777"));

    cancel.cancel();
    server.await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_the_accept_loop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let cancel = CancellationToken::new();
    let server = tokio::spawn(serve(listener, 1, cancel.clone()));

    cancel.cancel();
    tokio::time::timeout(Duration::from_millis(200), server)
        .await
        .expect("serve loop exits on cancel")
        .unwrap();
}

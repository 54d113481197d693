// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handshake and lifecycle specs: registration, death sweep, master stop.

use crate::prelude::*;
use handoff_core::{MsgType, WorkerState};
use std::time::Duration;

#[tokio::test]
async fn single_worker_handshake_registers_a_connected_record() {
    let master = TestMaster::start().await;
    let mut worker = FakeWorker::dial(&master.socket_path, 1234).await;

    assert!(
        wait_for(Duration::from_secs(1), || master.total() == 1).await,
        "worker never appeared in the registry"
    );
    let record = master.master.registry().get(1234).expect("record for pid 1234");
    assert_eq!(record.state(), WorkerState::Connected);

    // The opening ping is master-originated.
    let ping = worker.expect_kind(MsgType::Ping, Duration::from_secs(1)).await;
    assert_eq!(ping.from_pid, handoff_core::MASTER_PID);
}

#[tokio::test]
async fn dead_worker_is_swept_within_one_tick() {
    let master = TestMaster::start().await;
    let worker_a = FakeWorker::dial(&master.socket_path, 1234).await;
    let worker_b = FakeWorker::dial(&master.socket_path, 5678).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 2).await);

    drop(worker_b);

    assert!(
        wait_for(Duration::from_secs(2), || master.total() == 1).await,
        "dead worker survived the sweep"
    );
    assert!(master.master.registry().get(1234).is_some());
    assert!(master.master.registry().get(5678).is_none());
    drop(worker_a);
}

#[tokio::test]
async fn reconnecting_pid_replaces_its_record() {
    let master = TestMaster::start().await;
    let _first = FakeWorker::dial(&master.socket_path, 1234).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 1).await);

    let _second = FakeWorker::dial(&master.socket_path, 1234).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(master.total(), 1, "duplicate PID must replace, not accumulate");
}

#[tokio::test]
async fn master_shutdown_reaches_the_worker_stream() {
    let master = TestMaster::start().await;
    let mut worker = FakeWorker::dial(&master.socket_path, 1234).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 1).await);

    master.master.shutdown().await;

    // The record delivers a best-effort SHUTDOWN frame, then the stream
    // ends; the worker must observe both promptly.
    worker.expect_kind(MsgType::Shutdown, Duration::from_millis(500)).await;
    worker.expect_eof(Duration::from_millis(500)).await;
    assert_eq!(master.total(), 0);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator control socket specs.

use crate::prelude::*;
use handoff_core::MsgType;
use std::time::Duration;

#[tokio::test]
async fn ping_answers_pong() {
    let master = TestMaster::start().await;
    assert_eq!(send_line(master.addr(), "ping").await, "PONG\n");
}

#[tokio::test]
async fn status_reports_active_workers() {
    let master = TestMaster::start().await;
    let _a = FakeWorker::dial(&master.socket_path, 1234).await;
    let _b = FakeWorker::dial(&master.socket_path, 5678).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 2).await);

    assert_eq!(send_line(master.addr(), "status").await, "Active Workers: 2\n");
}

#[tokio::test]
async fn status_is_case_insensitive() {
    let master = TestMaster::start().await;
    assert_eq!(send_line(master.addr(), "STATUS").await, "Active Workers: 0\n");
    assert_eq!(send_line(master.addr(), "Status").await, "Active Workers: 0\n");
}

#[tokio::test]
async fn broadcast_reaches_every_worker() {
    let master = TestMaster::start().await;
    let mut a = FakeWorker::dial(&master.socket_path, 1234).await;
    let mut b = FakeWorker::dial(&master.socket_path, 5678).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 2).await);

    send_line_no_reply(master.addr(), "broadcast hello").await;

    for worker in [&mut a, &mut b] {
        let chat = worker.expect_kind(MsgType::Chat, Duration::from_secs(1)).await;
        assert_eq!(chat.payload.data, "hello");
    }
}

#[tokio::test]
async fn json_frames_dispatch_like_bare_lines() {
    let master = TestMaster::start().await;
    let frame = handoff_core::MessagePayload::new(
        handoff_core::MASTER_PID,
        handoff_core::CommandFrame::new(MsgType::Ping).with_name("status"),
        &handoff_core::SystemClock,
    );
    let line = serde_json::to_string(&frame).unwrap();
    assert_eq!(send_line(master.addr(), &line).await, "Active Workers: 0\n");
}

#[tokio::test]
async fn unknown_command_names_the_offender() {
    let master = TestMaster::start().await;
    assert_eq!(send_line(master.addr(), "frobnicate").await, "Unknown command: frobnicate\n");
}

#[tokio::test]
async fn health_reports_gateway_state() {
    let master = TestMaster::start().await;
    assert_eq!(send_line(master.addr(), "health").await, "HEALTHY\n");
}

#[tokio::test]
async fn help_lists_registered_commands() {
    let master = TestMaster::start().await;
    let first = send_line(master.addr(), "help").await;
    // Specs are sorted by name; BROADCAST leads the builtin set.
    assert!(first.starts_with("BROADCAST - "), "unexpected help line: {first}");
}

#[tokio::test]
async fn exit_says_goodbye_and_stops_the_master() {
    let master = TestMaster::start().await;
    let cancel = master.master.cancel_token();

    assert_eq!(send_line(master.addr(), "exit").await, "Bye!\n");
    tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
        .await
        .expect("master cancelled after exit");
}

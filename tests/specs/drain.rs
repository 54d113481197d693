// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drain orchestration specs.

use crate::prelude::*;
use handoff_core::MsgType;
use handoff_daemon::SystemCore;
use std::time::Duration;

#[tokio::test]
async fn drain_targets_exactly_one_worker() {
    let master = TestMaster::start().await;
    let mut target = FakeWorker::dial(&master.socket_path, 1234).await;
    let mut bystander = FakeWorker::dial(&master.socket_path, 5678).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 2).await);

    master.master.orchestrator().drain(1234).await;

    let drain = target.expect_kind(MsgType::Drain, Duration::from_secs(1)).await;
    assert_eq!(drain.payload.data, DRAIN_COMMAND);
    bystander.assert_no_kind(MsgType::Drain, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn drain_of_unknown_pid_changes_nothing() {
    let master = TestMaster::start().await;
    let mut worker = FakeWorker::dial(&master.socket_path, 1234).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 1).await);

    master.master.orchestrator().drain(999).await;

    worker.assert_no_kind(MsgType::Drain, Duration::from_millis(300)).await;
    assert_eq!(master.total(), 1);
}

#[tokio::test]
async fn drain_works_from_the_operator_socket() {
    let master = TestMaster::start().await;
    let mut worker = FakeWorker::dial(&master.socket_path, 1234).await;
    assert!(wait_for(Duration::from_secs(1), || master.total() == 1).await);

    send_line_no_reply(master.addr(), "drain 1234").await;

    let drain = worker.expect_kind(MsgType::Drain, Duration::from_secs(1)).await;
    assert_eq!(drain.payload.data, DRAIN_COMMAND);
}

#[tokio::test]
async fn malformed_drain_argument_reports_usage() {
    let master = TestMaster::start().await;
    assert_eq!(send_line(master.addr(), "drain nope").await, "usage: drain <pid>\n");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::StubWorker;
use handoff_core::{MessagePayload, MsgType, SystemClock, MASTER_PID};
use std::sync::atomic::Ordering;

fn ping() -> MessagePayload {
    MessagePayload::command(MsgType::Ping, MASTER_PID, &SystemClock)
}

#[tokio::test]
async fn broadcast_skips_disconnected_records() {
    let bus = EventBus;
    let alive = StubWorker::connected(1);
    let dead = StubWorker::disconnected(2);
    let workers: Vec<Arc<dyn WorkerProcess>> = vec![alive.clone(), dead.clone()];

    bus.broadcast(&ping(), &workers).await;

    assert_eq!(alive.sent.lock().len(), 1, "exactly one underlying send");
    assert!(dead.sent.lock().is_empty());
    assert_eq!(dead.shutdown_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn failed_send_shuts_record_down_and_continues() {
    let bus = EventBus;
    let failing = StubWorker::failing(1);
    let healthy = StubWorker::connected(2);
    let workers: Vec<Arc<dyn WorkerProcess>> = vec![failing.clone(), healthy.clone()];

    bus.broadcast(&ping(), &workers).await;

    assert_eq!(failing.shutdown_calls.load(Ordering::Relaxed), 1);
    assert!(failing.state().is_disconnected());
    assert_eq!(healthy.sent.lock().len(), 1, "later records still receive the frame");
}

#[tokio::test]
async fn send_propagates_record_errors() {
    let bus = EventBus;
    let failing: Arc<dyn WorkerProcess> = StubWorker::failing(9);
    let err = bus.send(&ping(), &failing).await.unwrap_err();
    assert!(matches!(err, crate::record::RecordError::NoConnection { pid: 9 }));
}

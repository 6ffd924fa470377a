// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A subscriber that falls behind is dropped; the scheduler recovers by resync.

use crate::prelude::*;
use rp_core::{JobSpec, Phase};
use rp_engine::SUBSCRIBER_BUFFER;

#[tokio::test]
async fn slow_subscriber_is_dropped() {
    let plane = Plane::start().await;
    let mut slow = plane.brokers.workspaces.subscribe();
    let before = plane.brokers.workspaces.subscriber_count();

    for i in 0..SUBSCRIBER_BUFFER + 10 {
        plane.h.workspace(&format!("ws-{i}"));
    }

    let dropped = wait_for(SPEC_WAIT_MAX_MS, || {
        plane.brokers.workspaces.subscriber_count() < before
    })
    .await;
    assert!(dropped, "slow subscriber was never dropped");

    // What was buffered is still readable, then the stream ends
    let mut received = 0;
    while slow.recv().await.is_some() {
        received += 1;
    }
    assert_eq!(received, SUBSCRIBER_BUFFER);
}

#[tokio::test]
async fn burst_beyond_the_mailbox_still_schedules_every_run() {
    let plane = Plane::start().await;

    let plans: Vec<JobSpec> = (0..SUBSCRIBER_BUFFER + 20)
        .map(|i| {
            let ws = plane.h.workspace(&format!("ws-{i}"));
            let run = plane.h.create_run(&ws, false);
            JobSpec::new(run.id, Phase::Plan)
        })
        .collect();

    let scheduled = wait_for(SPEC_WAIT_MAX_MS, || {
        plans.iter().all(|spec| plane.job(spec).is_some())
    })
    .await;
    let missing = plans.iter().filter(|spec| plane.job(spec).is_none()).count();
    assert!(scheduled, "{missing} runs never got a plan job");
}

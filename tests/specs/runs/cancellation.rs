// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation signals reach only the agent that owns the job.

use crate::prelude::*;
use rp_agent::{FakeExecutor, FakeOutcome};
use rp_core::{JobSpec, JobStatus, Phase, RunStatus, Signal};
use rp_engine::FinishJobOptions;

#[tokio::test]
async fn signal_is_scoped_to_the_owning_agent() {
    let plane = Plane::start().await;
    let (_, subject, _) = plane.h.pool("runners");
    let ws = plane.h.workspace("ws-123");
    let run = plane.h.create_run(&ws, false);
    let plan = JobSpec::new(run.id.clone(), Phase::Plan);
    plane.wait_job(&plan, JobStatus::Pending).await;

    let a1 = plane.h.register(&subject, "a1", 1);
    let a2 = plane.h.register(&subject, "a2", 1);
    let allocator = &plane.h.allocator;
    let job = allocator.get_job(&plan).unwrap();
    let (owner, other) = if job.agent_id.as_ref() == Some(&a1.id) {
        (a1, a2)
    } else {
        (a2, a1)
    };
    assert_eq!(job.agent_id.as_ref(), Some(&owner.id));

    allocator.start_job(&subject, &owner.id, &plan).unwrap();
    let signaled = allocator.signal_job(&plan, Signal::Cancel).unwrap();
    assert_eq!(signaled.status, JobStatus::Running);

    assert!(allocator.get_agent_jobs(&subject, &other.id).unwrap().is_empty());
    let polled = allocator.get_agent_jobs(&subject, &owner.id).unwrap();
    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].signaled, Some(Signal::Cancel));
    // Delivered once
    assert!(allocator.get_agent_jobs(&subject, &owner.id).unwrap().is_empty());

    allocator
        .finish_job(&subject, &owner.id, &plan, FinishJobOptions::canceled())
        .unwrap();
    assert_eq!(plane.job(&plan).unwrap().status, JobStatus::Canceled);
    plane.wait_run(&run.id, RunStatus::Canceled).await;
}

#[tokio::test]
async fn canceling_a_run_stops_the_agent_and_unblocks_the_queue() {
    let plane = Plane::start().await;
    let (_, _, secret) = plane.h.pool("runners");
    let ws = plane.h.workspace("network");
    let executor = FakeExecutor::new();
    executor.set_outcome(Phase::Plan, FakeOutcome::Hang);

    let run1 = plane.h.create_run(&ws, false);
    let run2 = plane.h.create_run(&ws, false);
    let plan1 = JobSpec::new(run1.id.clone(), Phase::Plan);
    let agent = plane.agent(&secret, "a1", 1, executor.clone());

    plane.wait_job(&plan1, JobStatus::Running).await;
    let run = plane.h.runs.cancel_run(&run1.id, false).unwrap();
    assert!(run.cancel_signaled_at_ms.is_some());

    plane.wait_run(&run1.id, RunStatus::Canceled).await;
    assert_eq!(executor.canceled(), vec![plan1]);

    // run-2 is promoted and its plan now hangs on the same agent
    plane
        .wait_job(&JobSpec::new(run2.id.clone(), Phase::Plan), JobStatus::Running)
        .await;
    agent.stop().await;
}

#[tokio::test]
async fn canceling_a_queued_run_never_reaches_an_agent() {
    let plane = Plane::start().await;
    let ws = plane.h.workspace("network");
    let run = plane.h.create_run(&ws, false);
    let plan = JobSpec::new(run.id.clone(), Phase::Plan);
    plane.wait_job(&plan, JobStatus::Pending).await;

    plane.h.runs.cancel_run(&run.id, false).unwrap();
    assert_eq!(plane.job(&plan).unwrap().status, JobStatus::Canceled);
    assert_eq!(plane.run(&run.id).status, RunStatus::Canceled);

    let released = wait_for(SPEC_WAIT_MAX_MS, || {
        plane
            .h
            .workspaces
            .get_workspace(&ws.id)
            .unwrap()
            .current_run_id
            .is_none()
    })
    .await;
    assert!(released, "workspace still held by the canceled run");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A run from creation to apply, and the workspace queue behind it.

use crate::prelude::*;
use rp_agent::{FakeExecutor, FakeOutcome};
use rp_core::{JobSpec, JobStatus, Phase, RunStatus};

#[tokio::test]
async fn plan_apply_then_next_run_is_promoted() {
    let plane = Plane::start().await;
    let (_, _, secret) = plane.h.pool("runners");
    let ws = plane.h.workspace("ws-123");

    let run1 = plane.h.create_run(&ws, false);
    let run2 = plane.h.create_run(&ws, false);
    let plan1 = JobSpec::new(run1.id.clone(), Phase::Plan);
    let plan2 = JobSpec::new(run2.id.clone(), Phase::Plan);

    // The first run is promoted and planned; the second waits its turn
    plane.wait_job(&plan1, JobStatus::Pending).await;
    assert!(plane.job(&plan2).is_none());
    assert_eq!(plane.run(&run2.id).status, RunStatus::Pending);

    let executor = FakeExecutor::new();
    let agent = plane.agent(&secret, "a1", 1, executor.clone());

    plane.wait_run(&run1.id, RunStatus::Planned).await;
    assert_eq!(plane.job(&plan1).unwrap().status, JobStatus::Finished);
    assert!(plane.job(&plan2).is_none(), "run-2 stays queued while run-1 awaits apply");

    plane.h.runs.apply_run(&run1.id).unwrap();
    plane.wait_run(&run1.id, RunStatus::Applied).await;

    // run-1 released the workspace; run-2 is now current and planned
    plane.wait_run(&run2.id, RunStatus::Planned).await;
    let ws = plane.h.workspaces.get_workspace(&ws.id).unwrap();
    assert_eq!(ws.current_run_id, Some(run2.id.clone()));

    assert_eq!(
        executor.started(),
        vec![
            plan1,
            JobSpec::new(run1.id.clone(), Phase::Apply),
            plan2,
        ]
    );
    agent.stop().await;
}

#[tokio::test]
async fn discarded_run_releases_the_workspace() {
    let plane = Plane::start().await;
    let (_, _, secret) = plane.h.pool("runners");
    let ws = plane.h.workspace("network");
    let run1 = plane.h.create_run(&ws, false);
    let run2 = plane.h.create_run(&ws, false);
    let agent = plane.agent(&secret, "a1", 1, FakeExecutor::new());

    plane.wait_run(&run1.id, RunStatus::Planned).await;
    plane.h.runs.discard_run(&run1.id).unwrap();

    plane.wait_run(&run2.id, RunStatus::Planned).await;
    agent.stop().await;
}

#[tokio::test]
async fn failed_plan_errors_the_run_and_frees_the_queue() {
    let plane = Plane::start().await;
    let (_, _, secret) = plane.h.pool("runners");
    let ws = plane.h.workspace("network");
    let executor = FakeExecutor::new();
    executor.set_outcome(Phase::Plan, FakeOutcome::Fail("syntax error".to_string()));

    let run1 = plane.h.create_run(&ws, false);
    let run2 = plane.h.create_run(&ws, true);
    let agent = plane.agent(&secret, "a1", 1, executor);

    plane.wait_run(&run1.id, RunStatus::Errored).await;
    let job = plane
        .job(&JobSpec::new(run1.id.clone(), Phase::Plan))
        .unwrap();
    assert_eq!(job.error.as_deref(), Some("syntax error"));

    // The plan-only run behind it ran speculatively and failed the same way
    plane.wait_run(&run2.id, RunStatus::Errored).await;
    agent.stop().await;
}

#[tokio::test]
async fn speculative_run_skips_the_queue() {
    let plane = Plane::start().await;
    let (_, _, secret) = plane.h.pool("runners");
    let ws = plane.h.workspace("network");

    let run1 = plane.h.create_run(&ws, false);
    let speculative = plane.h.create_run(&ws, true);
    let agent = plane.agent(&secret, "a1", 2, FakeExecutor::new());

    // Plan-only runs never hold the workspace lock
    plane
        .wait_run(&speculative.id, RunStatus::PlannedAndFinished)
        .await;
    plane.wait_run(&run1.id, RunStatus::Planned).await;
    let ws = plane.h.workspaces.get_workspace(&ws.id).unwrap();
    assert_eq!(ws.current_run_id, Some(run1.id.clone()));
    agent.stop().await;
}

#[tokio::test]
async fn user_lock_holds_runs_until_unlocked() {
    let plane = Plane::start().await;
    let (_, _, secret) = plane.h.pool("runners");
    let ws = plane.h.workspace("network");
    plane.h.workspaces.lock_workspace(&ws.id, "alice").unwrap();

    let run = plane.h.create_run(&ws, false);
    let agent = plane.agent(&secret, "a1", 1, FakeExecutor::new());

    tokio::time::sleep(AGENT_POLL * 5).await;
    assert_eq!(plane.run(&run.id).status, RunStatus::Pending);

    plane
        .h
        .workspaces
        .unlock_workspace(&ws.id, "alice", false)
        .unwrap();
    plane.wait_run(&run.id, RunStatus::Planned).await;
    agent.stop().await;
}

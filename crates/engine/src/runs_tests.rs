// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::Harness;
use crate::{FinishJobOptions, RunQueue};
use rp_core::{ErrorKind, Phase};

fn plan(run: &Run) -> JobSpec {
    JobSpec::new(run.id.clone(), Phase::Plan)
}

/// Run promoted by a queue so its plan job exists.
fn queued_run(h: &Harness) -> Run {
    let ws = h.workspace("net");
    let run = h.create_run(&ws, false);
    let mut queue = h.queue(&ws);
    queue.handle_run(h.runs.get_run(&run.id).unwrap()).unwrap();
    h.runs.get_run(&run.id).unwrap()
}

#[test]
fn create_run_starts_pending_in_workspace_org() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let run = h.create_run(&ws, false);
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(run.workspace_id, ws.id);
    assert_eq!(run.organization, ws.organization);
    assert_eq!(h.runs.get_run(&run.id).unwrap(), run);
}

#[test]
fn create_run_requires_workspace() {
    let h = Harness::new();
    let err = h
        .runs
        .create_run(CreateRunOptions::new("ws-missing"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

#[test]
fn plan_only_run_never_auto_applies() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let run = h
        .runs
        .create_run(CreateRunOptions {
            workspace_id: ws.id.clone(),
            plan_only: true,
            auto_apply: true,
        })
        .unwrap();
    assert!(run.plan_only);
    assert!(!run.auto_apply);
}

#[test]
fn apply_and_discard_require_planned_run() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let run = h.create_run(&ws, false);
    assert_eq!(
        h.runs.apply_run(&run.id).unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        h.runs.discard_run(&run.id).unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn discard_planned_run() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let agent = h.register(&subject, "a1", 1);
    let run = queued_run(&h);
    h.allocator.start_job(&subject, &agent.id, &plan(&run)).unwrap();
    h.allocator
        .finish_job(&subject, &agent.id, &plan(&run), FinishJobOptions::finished())
        .unwrap();

    let run = h.runs.discard_run(&run.id).unwrap();
    assert_eq!(run.status, RunStatus::Discarded);
}

#[test]
fn cancel_without_job_cancels_directly() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let run = h.create_run(&ws, false);
    let run = h.runs.cancel_run(&run.id, false).unwrap();
    assert_eq!(run.status, RunStatus::Canceled);
    assert_eq!(run.cancel_signaled_at_ms, None);
}

#[test]
fn cancel_with_pending_job_cancels_both() {
    let h = Harness::new();
    let run = queued_run(&h);

    let run = h.runs.cancel_run(&run.id, false).unwrap();
    assert_eq!(run.status, RunStatus::Canceled);
    assert_eq!(
        h.allocator.get_job(&plan(&run)).unwrap().status,
        JobStatus::Canceled
    );
}

#[test]
fn cancel_with_leased_job_signals_agent() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let agent = h.register(&subject, "a1", 1);
    let run = queued_run(&h);
    h.allocator.start_job(&subject, &agent.id, &plan(&run)).unwrap();

    let run = h.runs.cancel_run(&run.id, false).unwrap();
    assert_eq!(run.status, RunStatus::Planning);
    assert_eq!(run.cancel_signaled_at_ms, Some(h.clock.epoch_ms()));
    assert_eq!(
        h.allocator.get_job(&plan(&run)).unwrap().signaled,
        Some(Signal::Cancel)
    );

    h.allocator
        .finish_job(&subject, &agent.id, &plan(&run), FinishJobOptions::canceled())
        .unwrap();
    assert_eq!(h.runs.get_run(&run.id).unwrap().status, RunStatus::Canceled);
}

#[test]
fn force_cancel_marks_run_immediately() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let agent = h.register(&subject, "a1", 1);
    let run = queued_run(&h);
    h.allocator.start_job(&subject, &agent.id, &plan(&run)).unwrap();

    let run = h.runs.cancel_run(&run.id, true).unwrap();
    assert_eq!(run.status, RunStatus::ForceCanceled);
    assert_eq!(
        h.allocator.get_job(&plan(&run)).unwrap().signaled,
        Some(Signal::ForceCancel)
    );

    // The agent's late report does not overwrite the forced status.
    h.allocator
        .finish_job(&subject, &agent.id, &plan(&run), FinishJobOptions::canceled())
        .unwrap();
    assert_eq!(
        h.runs.get_run(&run.id).unwrap().status,
        RunStatus::ForceCanceled
    );
}

#[test]
fn cancel_finished_run_fails() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let run = h.create_run(&ws, false);
    h.runs.cancel_run(&run.id, false).unwrap();
    assert_eq!(
        h.runs.cancel_run(&run.id, false).unwrap_err().kind(),
        ErrorKind::Validation
    );
}

#[test]
fn list_runs_in_creation_order_per_workspace() {
    let h = Harness::new();
    let a = h.workspace("a");
    let b = h.workspace("b");
    let first = h.create_run(&a, false);
    let other = h.create_run(&b, false);
    let second = h.create_run(&a, true);

    let ids = |runs: Vec<Run>| runs.into_iter().map(|r| r.id).collect::<Vec<_>>();
    assert_eq!(
        ids(h.runs.list_runs(Some(&a.id)).unwrap()),
        vec![first.id.clone(), second.id.clone()]
    );
    assert_eq!(
        ids(h.runs.list_runs(None).unwrap()),
        vec![first.id, other.id, second.id]
    );
}

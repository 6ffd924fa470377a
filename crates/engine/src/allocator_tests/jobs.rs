// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::CreateRunOptions;

/// One agent of capacity 1 holding the plan job of a fresh run.
fn allocated(h: &Harness) -> (PoolSubject, Agent, JobSpec) {
    let (_, subject, _) = h.pool("default");
    let agent = h.register(&subject, "a1", 1);
    let spec = plan_job(h, &h.workspace("net"));
    (subject, agent, spec)
}

#[test]
fn enqueue_phase_creates_pending_job_once() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let run = h.create_run(&ws, false);

    let job = h.allocator.enqueue_phase(&run.id, Phase::Plan).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.workspace_id, ws.id);
    assert_eq!(h.runs.get_run(&run.id).unwrap().status, RunStatus::PlanQueued);

    let err = h.allocator.enqueue_phase(&run.id, Phase::Plan).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceAlreadyExists);
    assert_eq!(h.allocator.list_jobs().unwrap().len(), 1);
}

#[test]
fn enqueue_apply_requires_confirmed_run() {
    let h = Harness::new();
    let run = h.create_run(&h.workspace("net"), false);
    let err = h.allocator.enqueue_phase(&run.id, Phase::Apply).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn job_inherits_workspace_pool_pin() {
    let h = Harness::new();
    let (pool, _, _) = h.pool("default");
    let ws = h
        .workspaces
        .create_workspace(crate::CreateWorkspaceOptions {
            name: "net".into(),
            organization: TEST_ORG.into(),
            agent_pool_id: Some(pool.id.clone()),
            speculative_enabled: None,
        })
        .unwrap();
    let spec = plan_job(&h, &ws);
    assert_eq!(job(&h, &spec).agent_pool_id, Some(pool.id));
}

#[test]
fn poll_returns_allocated_jobs_idempotently() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);

    let first = h.allocator.get_agent_jobs(&subject, &a1.id).unwrap();
    let second = h.allocator.get_agent_jobs(&subject, &a1.id).unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].spec, spec);
    assert_eq!(first, second);
}

#[test]
fn poll_is_scoped_to_the_token_pool() {
    let h = Harness::new();
    let (_, a1, _) = allocated(&h);
    let (_, stranger, _) = h.pool("other");
    let err = h.allocator.get_agent_jobs(&stranger, &a1.id).unwrap_err();
    assert_eq!(err, Error::AccessNotPermitted);
}

#[test]
fn start_job_claims_and_advances_run() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);

    let started = h.allocator.start_job(&subject, &a1.id, &spec).unwrap();

    assert_eq!(started.job.status, JobStatus::Running);
    assert_eq!(started.run.status, RunStatus::Planning);
    assert_eq!(started.workspace.name, "net");
    assert!(started.token.starts_with(crate::JOB_TOKEN_PREFIX));
    assert!(h.allocator.get_agent_jobs(&subject, &a1.id).unwrap().is_empty());
}

#[test]
fn duplicate_start_fails() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();
    let err = h.allocator.start_job(&subject, &a1.id, &spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn start_by_non_owner_is_rejected() {
    let h = Harness::new();
    let (subject, _, spec) = allocated(&h);
    let a2 = h.register(&subject, "a2", 1);
    let err = h.allocator.start_job(&subject, &a2.id, &spec).unwrap_err();
    assert_eq!(err, Error::AccessNotPermitted);
}

#[test]
fn finish_job_frees_slot_and_advances_run() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();

    let finished = h
        .allocator
        .finish_job(&subject, &a1.id, &spec, FinishJobOptions::finished())
        .unwrap();

    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(finished.token_hash, None);
    assert_eq!(agent(&h, &a1.id).current_jobs, 0);
    assert_eq!(run_of(&h, &spec).status, RunStatus::Planned);
}

#[test]
fn auto_apply_run_queues_apply_after_plan() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    let run = h
        .runs
        .create_run(CreateRunOptions {
            workspace_id: h.workspace("net").id,
            plan_only: false,
            auto_apply: true,
        })
        .unwrap();
    h.allocator.enqueue_phase(&run.id, Phase::Plan).unwrap();
    let spec = JobSpec::new(run.id.clone(), Phase::Plan);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();

    h.allocator
        .finish_job(&subject, &a1.id, &spec, FinishJobOptions::finished())
        .unwrap();

    assert_eq!(run_of(&h, &spec).status, RunStatus::ApplyQueued);
}

#[test]
fn errored_job_errors_run_with_message() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();

    let errored = h
        .allocator
        .finish_job(&subject, &a1.id, &spec, FinishJobOptions::errored("exit status 1"))
        .unwrap();

    assert_eq!(errored.error.as_deref(), Some("exit status 1"));
    assert_eq!(run_of(&h, &spec).status, RunStatus::Errored);
}

#[test]
fn finish_requires_terminal_status() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();
    let opts = FinishJobOptions {
        status: JobStatus::Running,
        error: None,
    };
    let err = h.allocator.finish_job(&subject, &a1.id, &spec, opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(agent(&h, &a1.id).current_jobs, 1);
}

#[test]
fn running_job_signal_is_delivered_once() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();

    h.allocator.signal_job(&spec, Signal::Cancel).unwrap();

    let polled = h.allocator.get_agent_jobs(&subject, &a1.id).unwrap();
    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].signaled, Some(Signal::Cancel));
    assert!(h.allocator.get_agent_jobs(&subject, &a1.id).unwrap().is_empty());
    assert_eq!(job(&h, &spec).status, JobStatus::Running);
}

#[test]
fn signal_is_only_visible_to_the_owner() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    let a2 = h.register(&subject, "a2", 1);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();
    h.allocator.signal_job(&spec, Signal::Cancel).unwrap();

    assert!(h.allocator.get_agent_jobs(&subject, &a2.id).unwrap().is_empty());
    assert_eq!(h.allocator.get_agent_jobs(&subject, &a1.id).unwrap().len(), 1);
}

#[test]
fn signaled_allocated_job_cannot_start() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);

    h.allocator.signal_job(&spec, Signal::Cancel).unwrap();

    let polled = h.allocator.get_agent_jobs(&subject, &a1.id).unwrap();
    assert_eq!(polled[0].signaled, Some(Signal::Cancel));
    let err = h.allocator.start_job(&subject, &a1.id, &spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    h.allocator
        .finish_job(&subject, &a1.id, &spec, FinishJobOptions::canceled())
        .unwrap();
    assert_eq!(run_of(&h, &spec).status, RunStatus::Canceled);
    assert_eq!(agent(&h, &a1.id).current_jobs, 0);
}

#[test]
fn signaling_pending_job_cancels_it() {
    let h = Harness::new();
    let spec = plan_job(&h, &h.workspace("net"));

    let canceled = h.allocator.signal_job(&spec, Signal::Cancel).unwrap();

    assert_eq!(canceled.status, JobStatus::Canceled);
    assert_eq!(run_of(&h, &spec).status, RunStatus::Canceled);
}

#[test]
fn signaling_finished_job_fails() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();
    h.allocator
        .finish_job(&subject, &a1.id, &spec, FinishJobOptions::finished())
        .unwrap();
    let err = h.allocator.signal_job(&spec, Signal::Cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn force_cancel_is_not_downgraded() {
    let h = Harness::new();
    let (subject, a1, spec) = allocated(&h);
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();

    h.allocator.signal_job(&spec, Signal::ForceCancel).unwrap();
    h.allocator.signal_job(&spec, Signal::Cancel).unwrap();

    assert_eq!(job(&h, &spec).signaled, Some(Signal::ForceCancel));
}

#[test]
fn signaling_unknown_job_is_not_found() {
    let h = Harness::new();
    let err = h
        .allocator
        .signal_job(&JobSpec::new("run-404", Phase::Plan), Signal::Cancel)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

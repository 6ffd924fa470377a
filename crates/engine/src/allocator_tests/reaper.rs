// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config() -> ReaperConfig {
    ReaperConfig {
        agent_unknown_after: Duration::from_secs(60),
        job_lease_timeout: Duration::from_secs(300),
    }
}

fn heartbeat(h: &Harness, subject: &PoolSubject, agent: &Agent) {
    h.allocator
        .update_agent_status(subject, &agent.id, AgentStatus::Idle)
        .unwrap();
}

#[test]
fn nothing_to_reap_while_agents_heartbeat() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    plan_job(&h, &h.workspace("net"));

    h.clock.advance(Duration::from_secs(59));
    assert!(h.allocator.reap(&config()).unwrap().is_empty());
    h.clock.advance(Duration::from_secs(59));
    heartbeat(&h, &subject, &a1);
    assert!(h.allocator.reap(&config()).unwrap().is_empty());
}

#[test]
fn silent_agent_becomes_unknown() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    let a2 = h.register(&subject, "a2", 1);

    h.clock.advance(Duration::from_secs(61));
    heartbeat(&h, &subject, &a2);
    let report = h.allocator.reap(&config()).unwrap();

    assert_eq!(report.unknown_agents, vec![a1.id.clone()]);
    assert_eq!(agent(&h, &a1.id).status, AgentStatus::Unknown);
    assert_eq!(agent(&h, &a2.id).status, AgentStatus::Idle);

    // Marking is not repeated on the next sweep.
    assert!(h.allocator.reap(&config()).unwrap().unknown_agents.is_empty());
}

#[test]
fn unknown_agent_gets_no_new_work_until_it_reports() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    h.clock.advance(Duration::from_secs(61));
    h.allocator.reap(&config()).unwrap();

    let spec = plan_job(&h, &h.workspace("net"));
    assert_eq!(job(&h, &spec).status, JobStatus::Pending);

    heartbeat(&h, &subject, &a1);
    assert_eq!(job(&h, &spec).agent_id, Some(a1.id));
}

#[test]
fn expired_allocation_moves_to_a_live_agent() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    let spec = plan_job(&h, &h.workspace("net"));
    assert_eq!(job(&h, &spec).agent_id, Some(a1.id.clone()));

    h.clock.advance(Duration::from_secs(301));
    let a2 = h.register(&subject, "a2", 1);
    let report = h.allocator.reap(&config()).unwrap();

    assert_eq!(report.requeued_jobs, vec![spec.clone()]);
    assert_eq!(agent(&h, &a1.id).current_jobs, 0);
    assert_eq!(job(&h, &spec).agent_id, Some(a2.id.clone()));
    assert_eq!(agent(&h, &a2.id).current_jobs, 1);
}

#[test]
fn expired_running_job_errors_its_run() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    let spec = plan_job(&h, &h.workspace("net"));
    h.allocator.start_job(&subject, &a1.id, &spec).unwrap();

    h.clock.advance(Duration::from_secs(301));
    let report = h.allocator.reap(&config()).unwrap();

    assert_eq!(report.errored_jobs, vec![spec.clone()]);
    let errored = job(&h, &spec);
    assert_eq!(errored.status, JobStatus::Errored);
    assert_eq!(errored.error.as_deref(), Some("agent lease expired"));
    assert_eq!(run_of(&h, &spec).status, RunStatus::Errored);
    assert_eq!(agent(&h, &a1.id).current_jobs, 0);
}

#[test]
fn expired_allocation_with_pending_cancel_is_canceled() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    h.register(&subject, "a1", 1);
    let spec = plan_job(&h, &h.workspace("net"));
    h.allocator.signal_job(&spec, Signal::Cancel).unwrap();

    h.clock.advance(Duration::from_secs(301));
    let report = h.allocator.reap(&config()).unwrap();

    assert_eq!(report.canceled_jobs, vec![spec.clone()]);
    assert_eq!(job(&h, &spec).status, JobStatus::Canceled);
    assert_eq!(run_of(&h, &spec).status, RunStatus::Canceled);
}

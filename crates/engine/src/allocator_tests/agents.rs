// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn options(name: &str, max_jobs: u32) -> RegisterAgentOptions {
    RegisterAgentOptions {
        name: name.to_string(),
        version: "1.2.0".to_string(),
        max_jobs,
        ip_address: [10, 0, 0, 7].into(),
    }
}

#[test]
fn register_agent_starts_idle_in_token_pool() {
    let h = Harness::new();
    let (pool, subject, _) = h.pool("default");

    let agent = h.allocator.register_agent(&subject, options("a1", 3)).unwrap();

    assert_eq!(agent.status, AgentStatus::Idle);
    assert_eq!(agent.agent_pool_id, pool.id);
    assert_eq!(agent.current_jobs, 0);
    assert_eq!(agent.max_jobs, 3);
    assert_eq!(agent.last_ping_at_ms, h.clock.epoch_ms());
    assert_eq!(h.allocator.list_agents(Some(&pool.id)).unwrap(), vec![agent]);
}

#[test]
fn register_agent_validates_options() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    for opts in [options("", 1), options("a1", 0)] {
        let err = h.allocator.register_agent(&subject, opts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

#[test]
fn register_agent_into_deleted_pool_fails() {
    let h = Harness::new();
    let (pool, subject, _) = h.pool("default");
    h.allocator.delete_pool(&pool.id).unwrap();
    let err = h.allocator.register_agent(&subject, options("a1", 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

#[test]
fn heartbeat_refreshes_ping_and_status() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);

    h.clock.advance(Duration::from_secs(30));
    let updated = h
        .allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Busy)
        .unwrap();

    assert_eq!(updated.status, AgentStatus::Busy);
    assert_eq!(updated.last_ping_at_ms, h.clock.epoch_ms());
    assert_eq!(updated.last_status_at_ms, h.clock.epoch_ms());
}

#[test]
fn heartbeat_from_another_pool_is_rejected() {
    let h = Harness::new();
    let (_, owner, _) = h.pool("default");
    let (_, stranger, _) = h.pool("other");
    let a1 = h.register(&owner, "a1", 1);

    let err = h
        .allocator
        .update_agent_status(&stranger, &a1.id, AgentStatus::Idle)
        .unwrap_err();
    assert_eq!(err, Error::AccessNotPermitted);
}

#[test]
fn exited_agent_cannot_report_again() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    h.allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Exited)
        .unwrap();

    let err = h
        .allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Idle)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn agents_cannot_report_unknown() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    let err = h
        .allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Unknown)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn recovering_agent_receives_waiting_work() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);

    h.clock.advance(Duration::from_secs(61));
    h.allocator.reap(&ReaperConfig::default()).unwrap();
    assert_eq!(agent(&h, &a1.id).status, AgentStatus::Unknown);

    let spec = plan_job(&h, &h.workspace("net"));
    assert_eq!(job(&h, &spec).status, JobStatus::Pending);

    h.allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Idle)
        .unwrap();

    assert_eq!(agent(&h, &a1.id).status, AgentStatus::Idle);
    assert_eq!(job(&h, &spec).status, JobStatus::Allocated);
    assert_eq!(job(&h, &spec).agent_id, Some(a1.id));
}

#[test]
fn errored_agent_cannot_come_back() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    h.allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Errored)
        .unwrap();

    let err = h
        .allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Idle)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let spec = plan_job(&h, &h.workspace("net"));
    assert_eq!(job(&h, &spec).status, JobStatus::Pending);
}

#[test]
fn deregister_requeues_unstarted_and_errors_running_jobs() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 2);
    let ws = h.workspace("net");
    let running = plan_job(&h, &ws);
    let other = h.workspace("dns");
    let allocated = plan_job(&h, &other);
    h.allocator.start_job(&subject, &a1.id, &running).unwrap();

    h.allocator.deregister_agent(&a1.id).unwrap();

    assert_eq!(
        h.allocator.get_agent(&a1.id).unwrap_err().kind(),
        ErrorKind::ResourceNotFound
    );
    let requeued = job(&h, &allocated);
    assert_eq!(requeued.status, JobStatus::Pending);
    assert_eq!(requeued.agent_id, None);
    assert_eq!(job(&h, &running).status, JobStatus::Errored);
    assert_eq!(run_of(&h, &running).status, RunStatus::Errored);
}

#[test]
fn deregister_hands_jobs_to_remaining_agents() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    let spec = plan_job(&h, &h.workspace("net"));
    assert_eq!(job(&h, &spec).agent_id, Some(a1.id.clone()));
    let a2 = h.register(&subject, "a2", 1);

    h.allocator.deregister_agent(&a1.id).unwrap();

    assert_eq!(job(&h, &spec).agent_id, Some(a2.id.clone()));
    assert_eq!(agent(&h, &a2.id).current_jobs, 1);
}

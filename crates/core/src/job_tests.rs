// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn job() -> Job {
    Job::new(
        JobSpec::new("run-1", Phase::Plan),
        WorkspaceId::new("ws-1"),
        "acme",
        None,
        0,
    )
}

#[test]
fn spec_key_and_parse() {
    let spec = JobSpec::new("run-1", Phase::Apply);
    assert_eq!(spec.key(), "run-1/apply");
    assert_eq!(spec.to_string(), "run-1/apply");
    assert_eq!(JobSpec::parse("run-1/apply").unwrap(), spec);
}

#[yare::parameterized(
    no_separator = { "run-1" },
    bad_phase = { "run-1/destroy" },
    empty_run = { "/plan" },
)]
fn spec_parse_rejects_malformed(key: &str) {
    assert!(matches!(JobSpec::parse(key), Err(Error::Validation(_))));
}

#[test]
fn happy_path_transitions() {
    let mut j = job();
    let agent = AgentId::new("agent-1");
    j.allocate(agent.clone()).unwrap();
    assert!(j.status.is_leased());
    j.start(&agent).unwrap();
    j.finish(JobStatus::Finished, None).unwrap();
    assert!(j.status.is_terminal());
    assert!(!j.status.is_leased());
}

#[test]
fn only_owner_can_start() {
    let mut j = job();
    j.allocate(AgentId::new("agent-1")).unwrap();
    assert_eq!(
        j.start(&AgentId::new("agent-2")),
        Err(Error::AccessNotPermitted)
    );
}

#[test]
fn second_start_fails() {
    let mut j = job();
    let agent = AgentId::new("agent-1");
    j.allocate(agent.clone()).unwrap();
    j.start(&agent).unwrap();
    assert!(j.start(&agent).is_err());
}

#[yare::parameterized(
    pending_to_running = { JobStatus::Pending, JobStatus::Running },
    finished_to_running = { JobStatus::Finished, JobStatus::Running },
    canceled_to_pending = { JobStatus::Canceled, JobStatus::Pending },
    running_to_pending = { JobStatus::Running, JobStatus::Pending },
)]
fn invalid_transitions(from: JobStatus, to: JobStatus) {
    assert!(!from.can_transition(to));
}

#[test]
fn finish_clears_signal_and_token() {
    let mut j = job();
    let agent = AgentId::new("agent-1");
    j.allocate(agent.clone()).unwrap();
    j.start(&agent).unwrap();
    j.signaled = Some(Signal::Cancel);
    j.token_hash = Some("abc".into());
    j.finish(JobStatus::Canceled, Some("interrupted".into()))
        .unwrap();
    assert_eq!(j.signaled, None);
    assert_eq!(j.token_hash, None);
    assert_eq!(j.error.as_deref(), Some("interrupted"));
}

#[test]
fn finish_rejects_non_terminal_status() {
    let mut j = job();
    assert!(j.finish(JobStatus::Allocated, None).is_err());
}

#[test]
fn release_returns_job_to_pending() {
    let mut j = job();
    j.allocate(AgentId::new("agent-1")).unwrap();
    j.release().unwrap();
    assert_eq!(j.status, JobStatus::Pending);
    assert_eq!(j.agent_id, None);
}

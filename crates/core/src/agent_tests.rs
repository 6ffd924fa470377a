// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn agent(status: AgentStatus, current: u32, max: u32) -> Agent {
    Agent {
        id: AgentId::new("agent-1"),
        name: "a1".into(),
        version: "0.1.0".into(),
        max_jobs: max,
        current_jobs: current,
        status,
        agent_pool_id: AgentPoolId::new("apool-1"),
        ip_address: "10.0.0.1".parse().unwrap(),
        last_ping_at_ms: 0,
        last_status_at_ms: 0,
    }
}

#[yare::parameterized(
    idle_free = { AgentStatus::Idle, 0, 1, true },
    busy_free = { AgentStatus::Busy, 1, 2, true },
    full = { AgentStatus::Busy, 2, 2, false },
    unknown = { AgentStatus::Unknown, 0, 1, false },
    errored = { AgentStatus::Errored, 0, 1, false },
    exited = { AgentStatus::Exited, 0, 1, false },
)]
fn allocation_eligibility(status: AgentStatus, current: u32, max: u32, expected: bool) {
    assert_eq!(agent(status, current, max).can_allocate(), expected);
}

#[test]
fn heartbeat_updates_ping_and_status_time() {
    let mut a = agent(AgentStatus::Idle, 0, 1);
    a.report_status(AgentStatus::Idle, 100).unwrap();
    assert_eq!(a.last_ping_at_ms, 100);
    assert_eq!(a.last_status_at_ms, 0, "unchanged status keeps timestamp");

    a.report_status(AgentStatus::Busy, 200).unwrap();
    assert_eq!(a.status, AgentStatus::Busy);
    assert_eq!(a.last_status_at_ms, 200);
}

#[test]
fn terminal_agent_rejects_heartbeat() {
    let mut a = agent(AgentStatus::Exited, 0, 1);
    assert!(a.report_status(AgentStatus::Idle, 1).is_err());
}

#[test]
fn agent_cannot_report_unknown() {
    let mut a = agent(AgentStatus::Idle, 0, 1);
    assert!(a.report_status(AgentStatus::Unknown, 1).is_err());
}

#[test]
fn unknown_agent_recovers_on_heartbeat() {
    let mut a = agent(AgentStatus::Busy, 1, 1);
    assert!(a.mark_unknown(10));
    assert!(!a.mark_unknown(20), "already unknown");
    assert_eq!(a.last_status_at_ms, 10);
    a.report_status(AgentStatus::Idle, 30).unwrap();
    assert_eq!(a.status, AgentStatus::Idle);
}

#[test]
fn release_slot_saturates() {
    let mut a = agent(AgentStatus::Idle, 0, 1);
    a.release_slot();
    assert_eq!(a.current_jobs, 0);
}

fn pool(scoped: bool, allowed: &[&str]) -> AgentPool {
    AgentPool {
        id: AgentPoolId::new("apool-1"),
        name: "default".into(),
        organization: "acme".into(),
        organization_scoped: scoped,
        allowed_workspaces: allowed.iter().map(|w| WorkspaceId::new(*w)).collect(),
        created_at_ms: 0,
    }
}

#[yare::parameterized(
    org_scoped = { true, &[], "ws-1", "acme", true },
    org_scoped_other_org = { true, &[], "ws-1", "globex", false },
    allow_listed = { false, &["ws-1"], "ws-1", "acme", true },
    not_listed = { false, &["ws-2"], "ws-1", "acme", false },
    listed_other_org = { false, &["ws-1"], "ws-1", "globex", false },
)]
fn pool_serves(scoped: bool, allowed: &[&str], ws: &str, org: &str, expected: bool) {
    assert_eq!(pool(scoped, allowed).serves(&WorkspaceId::new(ws), org), expected);
}

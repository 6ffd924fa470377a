// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use rp_core::test_support;
use std::collections::HashMap;

fn pools(list: &[AgentPool]) -> HashMap<AgentPoolId, AgentPool> {
    list.iter().map(|p| (p.id.clone(), p.clone())).collect()
}

fn candidate(id: &str, current: u32, pinged_at: u64) -> Agent {
    let mut agent = test_support::agent(id, "pool-1", 4);
    agent.current_jobs = current;
    agent.last_ping_at_ms = pinged_at;
    agent
}

#[test]
fn select_prefers_fewest_current_jobs() {
    let job = test_support::plan_job("run-1", "ws-1");
    let agents = vec![candidate("a", 2, 9_000), candidate("b", 1, 1_000)];
    let chosen = select_agent(&job, &agents, &pools(&[test_support::org_pool("pool-1")]));
    assert_eq!(chosen.unwrap().id, "b");
}

#[test]
fn select_breaks_ties_by_latest_ping_then_id() {
    let job = test_support::plan_job("run-1", "ws-1");
    let pools = pools(&[test_support::org_pool("pool-1")]);

    let agents = vec![candidate("a", 1, 1_000), candidate("b", 1, 2_000)];
    assert_eq!(select_agent(&job, &agents, &pools).unwrap().id, "b");

    let agents = vec![candidate("c", 1, 2_000), candidate("b", 1, 2_000)];
    assert_eq!(select_agent(&job, &agents, &pools).unwrap().id, "b");
}

#[test]
fn select_skips_ineligible_agents() {
    let job = test_support::plan_job("run-1", "ws-1");
    let pools = pools(&[test_support::org_pool("pool-1")]);

    let full = candidate("full", 4, 1_000);
    let mut busy_unknown = candidate("unknown", 0, 1_000);
    busy_unknown.status = AgentStatus::Unknown;
    let mut errored = candidate("errored", 0, 1_000);
    errored.status = AgentStatus::Errored;
    let orphan = test_support::agent("orphan", "pool-gone", 4);

    let agents = vec![full, busy_unknown, errored, orphan];
    assert!(select_agent(&job, &agents, &pools).is_none());
}

#[test]
fn select_respects_pool_scope_and_pinning() {
    let mut job = test_support::plan_job("run-1", "ws-1");
    let mut narrow = test_support::org_pool("pool-narrow");
    narrow.organization_scoped = false;
    let mut foreign = test_support::org_pool("pool-foreign");
    foreign.organization = "globex".into();
    let pools = pools(&[narrow.clone(), foreign, test_support::org_pool("pool-1")]);

    let agents = vec![
        test_support::agent("a-narrow", "pool-narrow", 1),
        test_support::agent("a-foreign", "pool-foreign", 1),
        test_support::agent("a-org", "pool-1", 1),
    ];
    assert_eq!(select_agent(&job, &agents, &pools).unwrap().id, "a-org");

    job.agent_pool_id = Some(narrow.id.clone());
    assert!(select_agent(&job, &agents, &pools).is_none());

    narrow.allowed_workspaces.insert(job.workspace_id.clone());
    let mut pools = pools;
    pools.insert(narrow.id.clone(), narrow);
    assert_eq!(select_agent(&job, &agents, &pools).unwrap().id, "a-narrow");
}

#[test]
fn job_waits_without_agents() {
    let h = Harness::new();
    let spec = plan_job(&h, &h.workspace("net"));
    assert_eq!(job(&h, &spec).status, JobStatus::Pending);
    assert!(h.allocator.allocate_pending().unwrap().is_empty());
}

#[test]
fn capacity_limits_allocation_until_a_slot_frees() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 2);

    let specs: Vec<JobSpec> = ["one", "two", "three"]
        .into_iter()
        .map(|name| plan_job(&h, &h.workspace(name)))
        .collect();

    let statuses = |h: &Harness| specs.iter().map(|s| job(h, s).status).collect::<Vec<_>>();
    assert_eq!(
        statuses(&h),
        vec![JobStatus::Allocated, JobStatus::Allocated, JobStatus::Pending]
    );
    assert_eq!(agent(&h, &a1.id).current_jobs, 2);

    h.allocator.start_job(&subject, &a1.id, &specs[0]).unwrap();
    h.allocator
        .finish_job(&subject, &a1.id, &specs[0], FinishJobOptions::finished())
        .unwrap();

    assert_eq!(job(&h, &specs[2]).status, JobStatus::Allocated);
    assert_eq!(agent(&h, &a1.id).current_jobs, 2);
}

#[test]
fn pending_jobs_spread_across_agents() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 2);
    let a2 = h.register(&subject, "a2", 2);

    let first = plan_job(&h, &h.workspace("one"));
    let second = plan_job(&h, &h.workspace("two"));

    let owners = [job(&h, &first).agent_id, job(&h, &second).agent_id];
    assert!(owners.contains(&Some(a1.id.clone())));
    assert!(owners.contains(&Some(a2.id.clone())));
}

#[test]
fn oldest_pending_job_is_placed_first() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let older = plan_job(&h, &h.workspace("one"));
    let newer = plan_job(&h, &h.workspace("two"));

    let a1 = h.register(&subject, "a1", 1);

    assert_eq!(job(&h, &older).agent_id, Some(a1.id));
    assert_eq!(job(&h, &newer).status, JobStatus::Pending);
}

proptest! {
    #[test]
    fn current_jobs_never_exceed_max_jobs(
        capacities in proptest::collection::vec(1u32..4, 1..4),
        workspaces in 0usize..10,
        finishes in 0usize..6,
    ) {
        let h = Harness::new();
        let (_, subject, _) = h.pool("default");
        let agents: Vec<Agent> = capacities
            .iter()
            .enumerate()
            .map(|(i, max)| h.register(&subject, &format!("a{}", i), *max))
            .collect();
        for i in 0..workspaces {
            plan_job(&h, &h.workspace(&format!("ws{}", i)));
        }

        let mut finished = 0;
        for spec in h.allocator.list_jobs().unwrap().into_iter().map(|j| j.spec) {
            if finished == finishes {
                break;
            }
            let Some(owner) = job(&h, &spec).agent_id else { continue };
            h.allocator.start_job(&subject, &owner, &spec).unwrap();
            h.allocator
                .finish_job(&subject, &owner, &spec, FinishJobOptions::finished())
                .unwrap();
            finished += 1;
        }

        let jobs = h.allocator.list_jobs().unwrap();
        for a in &agents {
            let a = agent(&h, &a.id);
            let leased = jobs
                .iter()
                .filter(|j| j.is_owned_by(&a.id) && j.status.is_leased())
                .count() as u32;
            prop_assert!(a.current_jobs <= a.max_jobs);
            prop_assert_eq!(a.current_jobs, leased);
        }
        let capacity: u32 = capacities.iter().sum();
        let pending = jobs.iter().filter(|j| j.status == JobStatus::Pending).count() as u32;
        let leased = jobs.iter().filter(|j| j.status.is_leased()).count() as u32;
        prop_assert!(pending == 0 || leased == capacity);
    }
}

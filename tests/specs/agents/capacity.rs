// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allocation never exceeds an agent's declared capacity.

use crate::prelude::*;
use rp_core::{JobSpec, JobStatus, Phase};
use rp_engine::FinishJobOptions;

#[tokio::test]
async fn full_agent_is_never_selected() {
    let plane = Plane::start().await;
    let (_, subject, _) = plane.h.pool("runners");
    let agent = plane.h.register(&subject, "a1", 2);

    let plans: Vec<JobSpec> = ["network", "storage", "compute"]
        .iter()
        .map(|name| {
            let ws = plane.h.workspace(name);
            let run = plane.h.create_run(&ws, false);
            JobSpec::new(run.id, Phase::Plan)
        })
        .collect();

    let settled = wait_for(SPEC_WAIT_MAX_MS, || {
        plans.iter().all(|spec| plane.job(spec).is_some())
            && plans
                .iter()
                .filter(|spec| plane.job(spec).unwrap().status == JobStatus::Allocated)
                .count()
                == 2
    })
    .await;
    assert!(settled, "expected two allocated jobs");

    let agent = plane.h.allocator.get_agent(&agent.id).unwrap();
    assert_eq!(agent.current_jobs, 2);
    let waiting: Vec<&JobSpec> = plans
        .iter()
        .filter(|spec| plane.job(spec).unwrap().status == JobStatus::Pending)
        .collect();
    assert_eq!(waiting.len(), 1, "the third job stays pending");
    let waiting = waiting[0].clone();

    // Freeing a slot lets it through
    let done = plans
        .iter()
        .find(|spec| plane.job(spec).unwrap().status == JobStatus::Allocated)
        .unwrap();
    plane
        .h
        .allocator
        .start_job(&subject, &agent.id, done)
        .unwrap();
    plane
        .h
        .allocator
        .finish_job(&subject, &agent.id, done, FinishJobOptions::finished())
        .unwrap();
    plane.wait_job(&waiting, JobStatus::Allocated).await;
    assert_eq!(plane.h.allocator.get_agent(&agent.id).unwrap().current_jobs, 2);
}

#[tokio::test]
async fn pinned_workspace_waits_for_its_pool() {
    let plane = Plane::start().await;
    let (_, general, _) = plane.h.pool("general");
    let (pinned_pool, pinned, _) = plane.h.pool("pinned");
    plane.h.register(&general, "a1", 4);

    let ws = plane
        .h
        .workspaces
        .create_workspace(rp_engine::CreateWorkspaceOptions {
            name: "secure".to_string(),
            organization: rp_core::test_support::TEST_ORG.to_string(),
            agent_pool_id: Some(pinned_pool.id.clone()),
            ..Default::default()
        })
        .unwrap();
    let run = plane.h.create_run(&ws, false);
    let plan = JobSpec::new(run.id.clone(), Phase::Plan);
    plane.wait_job(&plan, JobStatus::Pending).await;
    tokio::time::sleep(AGENT_POLL * 3).await;
    assert_eq!(plane.job(&plan).unwrap().status, JobStatus::Pending);

    let a2 = plane.h.register(&pinned, "a2", 1);
    plane.wait_job(&plan, JobStatus::Allocated).await;
    assert_eq!(plane.job(&plan).unwrap().agent_id, Some(a2.id));
}

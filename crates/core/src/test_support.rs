// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{
    Agent, AgentId, AgentPool, AgentPoolId, AgentStatus, Job, JobSpec, Phase, Run, RunId,
    Workspace, WorkspaceId,
};

pub const TEST_ORG: &str = "acme";

// ── Record factory functions ────────────────────────────────────────────────

pub fn workspace(id: &str) -> Workspace {
    Workspace::new(WorkspaceId::new(id), id, TEST_ORG, 1_000)
}

pub fn run(id: &str, workspace_id: &str) -> Run {
    Run::new(RunId::new(id), WorkspaceId::new(workspace_id), TEST_ORG, 1_000)
}

pub fn plan_job(run_id: &str, workspace_id: &str) -> Job {
    Job::new(
        JobSpec::new(run_id, Phase::Plan),
        WorkspaceId::new(workspace_id),
        TEST_ORG,
        None,
        1_000,
    )
}

pub fn org_pool(id: &str) -> AgentPool {
    AgentPool {
        id: AgentPoolId::new(id),
        name: id.to_string(),
        organization: TEST_ORG.to_string(),
        organization_scoped: true,
        allowed_workspaces: Default::default(),
        created_at_ms: 1_000,
    }
}

pub fn agent(id: &str, pool_id: &str, max_jobs: u32) -> Agent {
    Agent {
        id: AgentId::new(id),
        name: id.to_string(),
        version: "test".to_string(),
        max_jobs,
        current_jobs: 0,
        status: AgentStatus::Idle,
        agent_pool_id: AgentPoolId::new(pool_id),
        ip_address: std::net::IpAddr::from([127, 0, 0, 1]),
        last_ping_at_ms: 1_000,
        last_status_at_ms: 1_000,
    }
}

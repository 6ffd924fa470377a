// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allocator tests

mod agents;
mod allocation;
mod jobs;
mod pools;
mod reaper;
mod tokens;

use super::*;
use crate::test_helpers::Harness;
use rp_core::test_support::TEST_ORG;
use rp_core::{
    AgentPool, AgentStatus, ErrorKind, Job, JobSpec, JobStatus, Phase, Run, RunStatus, Signal, Workspace,
};
use std::time::Duration;

/// Create a run in `ws` and its pending plan job.
fn plan_job(h: &Harness, ws: &Workspace) -> JobSpec {
    let run = h.create_run(ws, false);
    h.allocator.enqueue_phase(&run.id, Phase::Plan).unwrap();
    JobSpec::new(run.id, Phase::Plan)
}

fn job(h: &Harness, spec: &JobSpec) -> Job {
    h.allocator.get_job(spec).unwrap()
}

fn run_of(h: &Harness, spec: &JobSpec) -> Run {
    h.runs.get_run(&spec.run_id).unwrap()
}

fn agent(h: &Harness, id: &AgentId) -> Agent {
    h.allocator.get_agent(id).unwrap()
}

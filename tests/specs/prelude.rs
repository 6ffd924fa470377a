// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rp_agent::{AgentConfig, AgentDaemon, ClientError, FakeExecutor, InProcClient};
use rp_core::{AgentId, Job, JobSpec, JobStatus, Run, RunId, RunStatus};
use rp_engine::test_helpers::Harness;
use rp_engine::Brokers;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 5;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;
pub const AGENT_POLL: Duration = Duration::from_millis(10);

/// Poll `condition` until it holds or `timeout_ms` elapses.
pub async fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    condition()
}

// =============================================================================
// Plane
// =============================================================================

/// An in-process control plane: the engine harness with its brokers relaying
/// the store's change feed and a scheduler consuming them.
pub struct Plane {
    pub h: Harness,
    pub brokers: Brokers,
    cancel: CancellationToken,
}

impl Plane {
    pub async fn start() -> Self {
        let h = Harness::new();
        let brokers = Brokers::new(&h.store);
        let cancel = CancellationToken::new();
        brokers.spawn(&h.store, &cancel);
        tokio::spawn(h.scheduler().run(
            h.store.clone(),
            brokers.workspaces.clone(),
            brokers.runs.clone(),
            cancel.clone(),
        ));
        let plane = Self {
            h,
            brokers,
            cancel,
        };
        let subscribed = wait_for(SPEC_WAIT_MAX_MS, || {
            plane.brokers.workspaces.subscriber_count() > 0
                && plane.brokers.runs.subscriber_count() > 0
        })
        .await;
        assert!(subscribed, "scheduler never subscribed");
        plane
    }

    /// Start an agent daemon for the pool behind `secret`.
    pub fn agent(&self, secret: &str, name: &str, max_jobs: u32, executor: FakeExecutor) -> Agent {
        let client = InProcClient::connect(Arc::clone(&self.h.allocator), secret).unwrap();
        let mut config = AgentConfig::new(name);
        config.max_jobs = max_jobs;
        config.poll_interval = AGENT_POLL;
        let cancel = self.cancel.child_token();
        let handle = tokio::spawn(AgentDaemon::new(client, executor, config).run(cancel.clone()));
        Agent { cancel, handle }
    }

    pub fn job(&self, spec: &JobSpec) -> Option<Job> {
        self.h.allocator.get_job(spec).ok()
    }

    pub fn run(&self, run_id: &RunId) -> Run {
        self.h.runs.get_run(run_id).unwrap()
    }

    pub async fn wait_job(&self, spec: &JobSpec, status: JobStatus) {
        let reached = wait_for(SPEC_WAIT_MAX_MS, || {
            self.job(spec).is_some_and(|j| j.status == status)
        })
        .await;
        assert!(reached, "job {spec} never reached {status}: {:?}", self.job(spec));
    }

    pub async fn wait_run(&self, run_id: &RunId, status: RunStatus) {
        let reached = wait_for(SPEC_WAIT_MAX_MS, || self.run(run_id).status == status).await;
        assert!(
            reached,
            "run {run_id} never reached {status}: {:?}",
            self.run(run_id)
        );
    }
}

impl Drop for Plane {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A running agent daemon.
pub struct Agent {
    cancel: CancellationToken,
    handle: JoinHandle<Result<AgentId, ClientError>>,
}

impl Agent {
    /// Stop the agent and return its ID.
    pub async fn stop(self) -> AgentId {
        self.cancel.cancel();
        self.handle.await.unwrap().unwrap()
    }
}

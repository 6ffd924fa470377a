// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::client::InProcClient;
use crate::executor::{FakeExecutor, FakeOutcome};
use rp_core::{Phase, RunStatus, Signal};
use rp_core::FakeClock;
use rp_engine::test_helpers::{Harness, TestAllocator};
use rp_storage::MemStore;

type TestDaemon = AgentDaemon<InProcClient<MemStore, FakeClock>, FakeExecutor>;

const POLL: Duration = Duration::from_millis(10);

struct Fixture {
    h: Harness,
    secret: String,
    executor: FakeExecutor,
}

impl Fixture {
    fn new() -> Self {
        let h = Harness::new();
        let (_, _, secret) = h.pool("runners");
        Self {
            h,
            secret,
            executor: FakeExecutor::new(),
        }
    }

    fn daemon(&self, max_jobs: u32) -> TestDaemon {
        let client = InProcClient::connect(Arc::clone(&self.h.allocator), &self.secret).unwrap();
        let mut config = AgentConfig::new("runner-1");
        config.max_jobs = max_jobs;
        config.poll_interval = POLL;
        AgentDaemon::new(client, self.executor.clone(), config)
    }

    /// A workspace with one run whose plan job is pending.
    fn plan(&self, workspace: &str) -> JobSpec {
        let ws = self.h.workspace(workspace);
        let run = self.h.create_run(&ws, false);
        self.h.allocator.enqueue_phase(&run.id, Phase::Plan).unwrap();
        JobSpec::new(run.id, Phase::Plan)
    }

    fn allocator(&self) -> &TestAllocator {
        &self.h.allocator
    }

    fn status(&self, spec: &JobSpec) -> JobStatus {
        self.allocator().get_job(spec).unwrap().status
    }
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn runs_an_allocated_job_to_completion() {
    let f = Fixture::new();
    let spec = f.plan("network");
    let cancel = CancellationToken::new();
    let agent = tokio::spawn(f.daemon(1).run(cancel.clone()));

    eventually("job to finish", || f.status(&spec) == JobStatus::Finished).await;
    let run = f.h.runs.get_run(&spec.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Planned);
    assert_eq!(f.executor.started(), vec![spec]);

    cancel.cancel();
    let agent_id = agent.await.unwrap().unwrap();
    let agent = f.allocator().get_agent(&agent_id).unwrap();
    assert_eq!(agent.status, AgentStatus::Exited);
    assert_eq!(agent.current_jobs, 0);
}

#[tokio::test]
async fn executor_failure_errors_the_job() {
    let f = Fixture::new();
    f.executor
        .set_outcome(Phase::Plan, FakeOutcome::Fail("provider crashed".to_string()));
    let spec = f.plan("network");
    let cancel = CancellationToken::new();
    let agent = tokio::spawn(f.daemon(1).run(cancel.clone()));

    eventually("job to error", || f.status(&spec) == JobStatus::Errored).await;
    let job = f.allocator().get_job(&spec).unwrap();
    assert_eq!(job.error.as_deref(), Some("provider crashed"));
    assert_eq!(
        f.h.runs.get_run(&spec.run_id).unwrap().status,
        RunStatus::Errored
    );

    cancel.cancel();
    agent.await.unwrap().unwrap();
}

#[tokio::test]
async fn signal_cancels_a_running_job() {
    let f = Fixture::new();
    f.executor.set_outcome(Phase::Plan, FakeOutcome::Hang);
    let spec = f.plan("network");
    let cancel = CancellationToken::new();
    let agent = tokio::spawn(f.daemon(1).run(cancel.clone()));

    eventually("job to run", || f.status(&spec) == JobStatus::Running).await;
    f.allocator().signal_job(&spec, Signal::Cancel).unwrap();

    eventually("job to cancel", || f.status(&spec) == JobStatus::Canceled).await;
    assert_eq!(f.executor.canceled(), vec![spec]);

    cancel.cancel();
    agent.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_cancels_running_jobs_and_exits() {
    let f = Fixture::new();
    f.executor.set_outcome(Phase::Plan, FakeOutcome::Hang);
    let spec = f.plan("network");
    let cancel = CancellationToken::new();
    let agent = tokio::spawn(f.daemon(1).run(cancel.clone()));

    eventually("job to run", || f.status(&spec) == JobStatus::Running).await;
    cancel.cancel();
    let agent_id = agent.await.unwrap().unwrap();

    assert_eq!(f.status(&spec), JobStatus::Canceled);
    assert_eq!(
        f.allocator().get_agent(&agent_id).unwrap().status,
        AgentStatus::Exited
    );
}

#[tokio::test]
async fn signaled_allocated_job_is_finished_without_running() {
    let f = Fixture::new();
    let (_, subject, secret) = f.h.pool("manual");
    let agent = f.h.register(&subject, "runner-1", 1);
    let spec = f.plan("network");
    assert_eq!(f.status(&spec), JobStatus::Allocated);
    f.allocator().signal_job(&spec, Signal::Cancel).unwrap();

    let client = InProcClient::connect(Arc::clone(&f.h.allocator), &secret).unwrap();
    let daemon = AgentDaemon::new(client, f.executor.clone(), AgentConfig::new("runner-1"));
    let mut running = HashMap::new();
    daemon.poll(&agent.id, &mut running).await;

    assert!(running.is_empty());
    assert!(f.executor.started().is_empty());
    assert_eq!(f.status(&spec), JobStatus::Canceled);
}

#[tokio::test]
async fn local_capacity_bounds_concurrent_starts() {
    let f = Fixture::new();
    f.executor.set_outcome(Phase::Plan, FakeOutcome::Hang);
    let (_, subject, secret) = f.h.pool("wide");
    // The server would allow two; the agent is configured for one
    let agent = f.h.register(&subject, "runner-1", 2);
    let first = f.plan("network");
    let second = f.plan("storage");
    assert_eq!(f.status(&first), JobStatus::Allocated);
    assert_eq!(f.status(&second), JobStatus::Allocated);

    let client = InProcClient::connect(Arc::clone(&f.h.allocator), &secret).unwrap();
    let mut config = AgentConfig::new("runner-1");
    config.max_jobs = 1;
    let daemon = AgentDaemon::new(client, f.executor.clone(), config);
    let mut running = HashMap::new();
    daemon.poll(&agent.id, &mut running).await;

    assert_eq!(running.len(), 1);
    let started = [f.status(&first), f.status(&second)]
        .iter()
        .filter(|s| **s == JobStatus::Running)
        .count();
    assert_eq!(started, 1);

    for job in running.values() {
        job.cancel.cancel();
    }
    for (_, job) in running {
        job.handle.await.unwrap();
    }
}

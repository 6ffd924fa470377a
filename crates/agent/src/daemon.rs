// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent's poll loop

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rp_core::{AgentId, AgentStatus, Job, JobSpec, JobStatus};
use rp_engine::StartedJob;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{AgentClient, ClientError, Registration};
use crate::executor::PhaseExecutor;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub version: String,
    pub max_jobs: u32,
    pub poll_interval: Duration,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_jobs: 1,
            poll_interval: Duration::from_secs(1),
        }
    }
}

struct RunningJob {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct AgentDaemon<C: AgentClient, E: PhaseExecutor> {
    client: Arc<C>,
    executor: Arc<E>,
    config: AgentConfig,
}

impl<C: AgentClient, E: PhaseExecutor> AgentDaemon<C, E> {
    pub fn new(client: C, executor: E, config: AgentConfig) -> Self {
        Self {
            client: Arc::new(client),
            executor: Arc::new(executor),
            config,
        }
    }

    /// Register, then poll until `cancel` fires. On shutdown running jobs are
    /// canceled and awaited, and the agent reports itself exited.
    ///
    /// Returns the registered agent's ID. Only registration failure is an
    /// error; later failures are logged and retried on the next tick.
    pub async fn run(self, cancel: CancellationToken) -> Result<AgentId, ClientError> {
        let agent = self
            .client
            .register(&Registration {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
                max_jobs: self.config.max_jobs,
            })
            .await?;
        let agent_id = agent.id;
        info!(agent_id = %agent_id, pool = %agent.agent_pool_id, "agent registered");

        let mut running: HashMap<JobSpec, RunningJob> = HashMap::new();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            running.retain(|_, job| !job.handle.is_finished());
            self.poll(&agent_id, &mut running).await;
        }

        info!(agent_id = %agent_id, running = running.len(), "agent stopping");
        for job in running.values() {
            job.cancel.cancel();
        }
        for (spec, job) in running {
            if let Err(e) = job.handle.await {
                warn!(job = %spec, error = %e, "job task ended abnormally");
            }
        }
        if let Err(e) = self.client.update_status(&agent_id, AgentStatus::Exited).await {
            warn!(agent_id = %agent_id, error = %e, "failed to report exit");
        }
        Ok(agent_id)
    }

    async fn poll(&self, agent_id: &AgentId, running: &mut HashMap<JobSpec, RunningJob>) {
        let status = if running.is_empty() {
            AgentStatus::Idle
        } else {
            AgentStatus::Busy
        };
        if let Err(e) = self.client.update_status(agent_id, status).await {
            warn!(agent_id = %agent_id, error = %e, "heartbeat failed");
        }

        let jobs = match self.client.get_jobs(agent_id).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "poll failed");
                return;
            }
        };

        for job in jobs {
            match (job.status, job.signaled) {
                (JobStatus::Running, Some(signal)) => match running.get(&job.spec) {
                    Some(task) => {
                        info!(job = %job.spec, ?signal, "relaying cancellation");
                        task.cancel.cancel();
                    }
                    None => warn!(job = %job.spec, "signal for a job this agent is not running"),
                },
                (JobStatus::Allocated, Some(signal)) => {
                    info!(job = %job.spec, ?signal, "job canceled before start");
                    self.finish(agent_id, &job.spec, JobStatus::Canceled, None).await;
                }
                (JobStatus::Allocated, None) => {
                    if running.contains_key(&job.spec) {
                        continue;
                    }
                    if running.len() >= self.config.max_jobs as usize {
                        debug!(job = %job.spec, "at capacity, leaving job allocated");
                        continue;
                    }
                    if let Some(task) = self.start(agent_id, &job).await {
                        running.insert(job.spec, task);
                    }
                }
                _ => {}
            }
        }
    }

    async fn start(&self, agent_id: &AgentId, job: &Job) -> Option<RunningJob> {
        let started = match self.client.start_job(agent_id, &job.spec).await {
            Ok(started) => started,
            Err(e) => {
                warn!(job = %job.spec, error = %e, "failed to start job");
                return None;
            }
        };
        info!(job = %job.spec, run_id = %started.run.id, workspace_id = %started.workspace.id, "job started");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(execute(
            Arc::clone(&self.client),
            Arc::clone(&self.executor),
            agent_id.clone(),
            started,
            cancel.clone(),
        ));
        Some(RunningJob { cancel, handle })
    }

    async fn finish(&self, agent_id: &AgentId, spec: &JobSpec, status: JobStatus, error: Option<String>) {
        report(self.client.as_ref(), agent_id, spec, status, error).await;
    }
}

async fn execute<C: AgentClient, E: PhaseExecutor>(
    client: Arc<C>,
    executor: Arc<E>,
    agent_id: AgentId,
    started: StartedJob,
    cancel: CancellationToken,
) {
    let spec = started.job.spec.clone();
    let (status, error) = match executor.execute(&started, cancel).await {
        Ok(()) => (JobStatus::Finished, None),
        Err(e) => (e.job_status(), Some(e.to_string())),
    };
    report(client.as_ref(), &agent_id, &spec, status, error).await;
}

async fn report<C: AgentClient>(
    client: &C,
    agent_id: &AgentId,
    spec: &JobSpec,
    status: JobStatus,
    error: Option<String>,
) {
    match client.finish_job(agent_id, spec, status, error).await {
        Ok(_) => info!(job = %spec, %status, "job reported"),
        Err(e) => warn!(job = %spec, %status, error = %e, "failed to report job"),
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;

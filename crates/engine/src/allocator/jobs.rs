// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job creation, the agent poll, start/finish, and cancellation signals

use super::{Allocator, FinishJobOptions, PoolSubject};
use crate::secret;
use rp_core::{
    Agent, AgentId, Clock, Error, Job, JobSpec, JobStatus, Phase, Run, RunId, Signal, Workspace,
};
use rp_storage::{Store, Tx};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything an agent needs to execute a phase, returned by `start_job`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedJob {
    pub job: Job,
    pub run: Run,
    pub workspace: Workspace,
    /// Per-job bearer token, valid while the job runs.
    pub token: String,
}

impl<S: Store, C: Clock> Allocator<S, C> {
    /// Create the pending job for a run's phase and mark the run queued.
    ///
    /// Fails with `ResourceAlreadyExists` if the job was already created.
    pub fn enqueue_phase(&self, run_id: &RunId, phase: Phase) -> Result<Job, Error> {
        let now = self.clock.epoch_ms();
        let job = self.store.tx(|tx| {
            let mut run = tx.get_for_update::<Run>(run_id.as_str())?;
            run.enqueue_phase(phase)?;
            let workspace = tx.get::<Workspace>(run.workspace_id.as_str())?;
            let job = Job::new(
                JobSpec::new(run_id.clone(), phase),
                workspace.id,
                workspace.organization,
                workspace.agent_pool_id,
                now,
            );
            tx.insert(job.clone())?;
            tx.update(run)?;
            Ok(job)
        })?;

        info!(job = %job.spec, workspace_id = %job.workspace_id, "job created");
        self.trigger_allocation();
        Ok(job)
    }

    /// The agent poll: jobs allocated to the agent but not yet started, plus
    /// jobs carrying a cancellation signal.
    ///
    /// A signal on a running job is acknowledged by this call and delivered
    /// once. A signal on an allocated job stays until the agent finishes it,
    /// and such a job cannot be started.
    pub fn get_agent_jobs(&self, subject: &PoolSubject, agent_id: &AgentId) -> Result<Vec<Job>, Error> {
        self.store.tx(|tx| {
            Self::agent_for(tx, subject, agent_id)?;
            let mut jobs = Vec::new();
            for job in tx.filter::<Job>(|j| j.is_owned_by(agent_id)) {
                match (job.status, job.signaled) {
                    (JobStatus::Allocated, _) => jobs.push(job),
                    (JobStatus::Running, Some(_)) => {
                        tx.modify::<Job>(&job.key(), |j| {
                            j.signaled = None;
                            Ok(())
                        })?;
                        jobs.push(job);
                    }
                    _ => {}
                }
            }
            Ok(jobs)
        })
    }

    /// Claim an allocated job. A duplicate claim fails.
    pub fn start_job(
        &self,
        subject: &PoolSubject,
        agent_id: &AgentId,
        spec: &JobSpec,
    ) -> Result<StartedJob, Error> {
        let token = secret::generate(secret::JOB_TOKEN_PREFIX);
        let started = self.store.tx(|tx| {
            Self::agent_for(tx, subject, agent_id)?;
            let mut job = tx.get_for_update::<Job>(&spec.key())?;
            if job.signaled.is_some() {
                return Err(Error::validation(format!(
                    "job {} was canceled before it started",
                    spec
                )));
            }
            job.start(agent_id)?;
            job.token_hash = Some(secret::digest(&token));
            tx.update(job.clone())?;
            let run = tx.modify::<Run>(spec.run_id.as_str(), |run| run.start_phase(spec.phase))?;
            let workspace = tx.get::<Workspace>(job.workspace_id.as_str())?;
            Ok(StartedJob {
                job,
                run,
                workspace,
                token: token.clone(),
            })
        })?;

        info!(job = %spec, agent_id = %agent_id, "job started");
        Ok(started)
    }

    /// Record a job's outcome and free the agent's slot.
    pub fn finish_job(
        &self,
        subject: &PoolSubject,
        agent_id: &AgentId,
        spec: &JobSpec,
        opts: FinishJobOptions,
    ) -> Result<Job, Error> {
        let job = self.store.tx(|tx| {
            Self::agent_for(tx, subject, agent_id)?;
            let mut job = tx.get_for_update::<Job>(&spec.key())?;
            if !job.is_owned_by(agent_id) {
                return Err(Error::AccessNotPermitted);
            }
            job.finish(opts.status, opts.error.clone())?;
            tx.update(job.clone())?;
            tx.modify::<Agent>(agent_id.as_str(), |agent| {
                agent.release_slot();
                Ok(())
            })?;
            finish_run_phase(tx, spec, opts.status)?;
            Ok(job)
        })?;

        info!(
            job = %spec,
            agent_id = %agent_id,
            status = %opts.status,
            error = opts.error.as_deref().unwrap_or(""),
            "job finished",
        );
        self.trigger_allocation();
        Ok(job)
    }

    /// Request cancellation. Pending jobs have no owner to notify and are
    /// canceled outright; leased jobs are flagged for their agent.
    pub fn signal_job(&self, spec: &JobSpec, signal: Signal) -> Result<Job, Error> {
        let job = self.store.tx(|tx| {
            let job = tx.get_for_update::<Job>(&spec.key())?;
            if job.status == JobStatus::Pending {
                let job = tx.modify::<Job>(&spec.key(), |j| {
                    j.finish(JobStatus::Canceled, Some("canceled before allocation".into()))
                })?;
                finish_run_phase(tx, spec, JobStatus::Canceled)?;
                Ok(job)
            } else {
                set_signal(tx, spec, signal)
            }
        })?;
        info!(job = %spec, ?signal, status = %job.status, "job signaled");
        Ok(job)
    }

    pub fn get_job(&self, spec: &JobSpec) -> Result<Job, Error> {
        self.store.tx(|tx| tx.get::<Job>(&spec.key()))
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>, Error> {
        self.store.tx(|tx| Ok(tx.list::<Job>()))
    }
}

/// Flag a leased job. Status is left unchanged; a force signal supersedes
/// a plain one.
pub(crate) fn set_signal(tx: &mut Tx<'_>, spec: &JobSpec, signal: Signal) -> Result<Job, Error> {
    tx.modify::<Job>(&spec.key(), |job| {
        if !job.status.is_leased() {
            return Err(Error::validation(format!(
                "job {} is {} and cannot be signaled",
                spec, job.status
            )));
        }
        if job.signaled != Some(Signal::ForceCancel) {
            job.signaled = Some(signal);
        }
        Ok(())
    })
}

/// Advance the job's run after the job reached a terminal status.
pub(crate) fn finish_run_phase(tx: &mut Tx<'_>, spec: &JobSpec, outcome: JobStatus) -> Result<(), Error> {
    let mut run = tx.get_for_update::<Run>(spec.run_id.as_str())?;
    if run.finish_phase(spec.phase, outcome)? {
        tx.update(run)?;
    }
    Ok(())
}

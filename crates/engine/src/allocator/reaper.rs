// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease expiry for silent agents

use super::jobs::finish_run_phase;
use super::Allocator;
use rp_core::{Agent, AgentId, Clock, Error, Job, JobSpec, JobStatus};
use rp_storage::Store;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Silence after which an idle or busy agent is marked unknown.
    pub agent_unknown_after: Duration,
    /// Silence after which an agent's leased jobs are taken back.
    pub job_lease_timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            agent_unknown_after: Duration::from_secs(60),
            job_lease_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReapReport {
    pub unknown_agents: Vec<AgentId>,
    /// Allocated jobs handed back to the pending pool.
    pub requeued_jobs: Vec<JobSpec>,
    /// Allocated jobs whose cancellation was never picked up.
    pub canceled_jobs: Vec<JobSpec>,
    /// Running jobs errored because their lease expired.
    pub errored_jobs: Vec<JobSpec>,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.unknown_agents.is_empty()
            && self.requeued_jobs.is_empty()
            && self.canceled_jobs.is_empty()
            && self.errored_jobs.is_empty()
    }
}

impl<S: Store, C: Clock> Allocator<S, C> {
    pub fn reap(&self, config: &ReaperConfig) -> Result<ReapReport, Error> {
        let now = self.clock.epoch_ms();
        let silent_for = |agent: &Agent| now.saturating_sub(agent.last_ping_at_ms);
        let unknown_after = config.agent_unknown_after.as_millis() as u64;
        let lease_timeout = config.job_lease_timeout.as_millis() as u64;

        let report = self.store.tx(|tx| {
            let mut report = ReapReport::default();
            let agents: HashMap<AgentId, Agent> = tx
                .list::<Agent>()
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect();

            for agent in agents.values() {
                if agent.status.is_allocatable() && silent_for(agent) > unknown_after {
                    tx.modify::<Agent>(agent.id.as_str(), |a| {
                        a.mark_unknown(now);
                        Ok(())
                    })?;
                    report.unknown_agents.push(agent.id.clone());
                }
            }

            for job in tx.filter::<Job>(|j| j.status.is_leased()) {
                let owner = job.agent_id.as_ref().and_then(|id| agents.get(id));
                let expired = owner.is_none_or(|agent| silent_for(agent) > lease_timeout);
                if !expired {
                    continue;
                }
                if job.status == JobStatus::Allocated && job.signaled.is_some() {
                    tx.modify::<Job>(&job.key(), |j| {
                        j.finish(JobStatus::Canceled, Some("canceled before start".to_string()))
                    })?;
                    finish_run_phase(tx, &job.spec, JobStatus::Canceled)?;
                    report.canceled_jobs.push(job.spec.clone());
                } else if job.status == JobStatus::Allocated {
                    tx.modify::<Job>(&job.key(), |j| j.release())?;
                    report.requeued_jobs.push(job.spec.clone());
                } else {
                    tx.modify::<Job>(&job.key(), |j| {
                        j.finish(JobStatus::Errored, Some("agent lease expired".to_string()))
                    })?;
                    finish_run_phase(tx, &job.spec, JobStatus::Errored)?;
                    report.errored_jobs.push(job.spec.clone());
                }
                if let Some(agent) = owner {
                    tx.modify::<Agent>(agent.id.as_str(), |a| {
                        a.release_slot();
                        Ok(())
                    })?;
                }
            }
            Ok(report)
        })?;

        for agent_id in &report.unknown_agents {
            warn!(agent_id = %agent_id, "agent stopped heartbeating, marked unknown");
        }
        for spec in &report.requeued_jobs {
            info!(job = %spec, "lease expired before start, job requeued");
        }
        for spec in &report.canceled_jobs {
            info!(job = %spec, "lease expired with cancel pending, job canceled");
        }
        for spec in &report.errored_jobs {
            warn!(job = %spec, "lease expired while running, job errored");
        }
        if !report.requeued_jobs.is_empty()
            || !report.canceled_jobs.is_empty()
            || !report.errored_jobs.is_empty()
        {
            self.trigger_allocation();
        }
        Ok(report)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registration, heartbeat, and deregistration

use super::jobs::finish_run_phase;
use super::{Allocator, PoolSubject, RegisterAgentOptions};
use rp_core::{
    Agent, AgentId, AgentPool, AgentPoolId, AgentStatus, Clock, Error, Job, JobStatus,
};
use rp_storage::Store;
use tracing::{debug, info};

impl<S: Store, C: Clock> Allocator<S, C> {
    /// Register a new agent in the subject's pool with status idle.
    pub fn register_agent(
        &self,
        subject: &PoolSubject,
        opts: RegisterAgentOptions,
    ) -> Result<Agent, Error> {
        if opts.name.trim().is_empty() {
            return Err(Error::validation("agent name is required"));
        }
        if opts.max_jobs == 0 {
            return Err(Error::validation("max_jobs must be at least 1"));
        }

        let now = self.clock.epoch_ms();
        let agent = Agent {
            id: AgentId::new(self.ids.next("agent")),
            name: opts.name,
            version: opts.version,
            max_jobs: opts.max_jobs,
            current_jobs: 0,
            status: AgentStatus::Idle,
            agent_pool_id: subject.pool_id.clone(),
            ip_address: opts.ip_address,
            last_ping_at_ms: now,
            last_status_at_ms: now,
        };
        self.store.tx(|tx| {
            tx.get::<AgentPool>(subject.pool_id.as_str())?;
            tx.insert(agent.clone())
        })?;

        info!(
            agent_id = %agent.id,
            pool = %agent.agent_pool_id,
            name = %agent.name,
            max_jobs = agent.max_jobs,
            ip = %agent.ip_address,
            "agent registered",
        );
        self.trigger_allocation();
        Ok(agent)
    }

    /// Heartbeat. Silence is never interpreted here; only the reaper does that.
    pub fn update_agent_status(
        &self,
        subject: &PoolSubject,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> Result<Agent, Error> {
        let now = self.clock.epoch_ms();
        let (previous, agent) = self.store.tx(|tx| {
            let mut agent = Self::agent_for(tx, subject, agent_id)?;
            let previous = agent.status;
            agent.report_status(status, now)?;
            tx.update(agent.clone())?;
            Ok((previous, agent))
        })?;

        if previous != status {
            info!(agent_id = %agent_id, from = %previous, to = %status, "agent status changed");
        } else {
            debug!(agent_id = %agent_id, %status, "agent heartbeat");
        }
        if agent.can_allocate() {
            self.trigger_allocation();
        }
        Ok(agent)
    }

    pub fn get_agent(&self, agent_id: &AgentId) -> Result<Agent, Error> {
        self.store.tx(|tx| tx.get::<Agent>(agent_id.as_str()))
    }

    pub fn list_agents(&self, pool_id: Option<&AgentPoolId>) -> Result<Vec<Agent>, Error> {
        self.store.tx(|tx| {
            Ok(tx.filter::<Agent>(|a| pool_id.is_none_or(|p| &a.agent_pool_id == p)))
        })
    }

    /// Remove an agent. Jobs it had not started return to pending; jobs it
    /// was running are errored along with their runs.
    pub fn deregister_agent(&self, agent_id: &AgentId) -> Result<Agent, Error> {
        let agent = self.store.tx(|tx| {
            let agent = tx.get_for_update::<Agent>(agent_id.as_str())?;
            for job in tx.filter::<Job>(|j| j.is_owned_by(agent_id) && j.status.is_leased()) {
                if job.status == JobStatus::Allocated && job.signaled.is_some() {
                    tx.modify::<Job>(&job.key(), |j| {
                        j.finish(JobStatus::Canceled, Some("canceled before start".to_string()))
                    })?;
                    finish_run_phase(tx, &job.spec, JobStatus::Canceled)?;
                } else if job.status == JobStatus::Allocated {
                    tx.modify::<Job>(&job.key(), |j| j.release())?;
                } else {
                    tx.modify::<Job>(&job.key(), |j| {
                        j.finish(JobStatus::Errored, Some("agent deregistered".to_string()))
                    })?;
                    finish_run_phase(tx, &job.spec, JobStatus::Errored)?;
                }
            }
            tx.delete::<Agent>(agent_id.as_str())?;
            Ok(agent)
        })?;

        info!(agent_id = %agent_id, "agent deregistered");
        self.trigger_allocation();
        Ok(agent)
    }
}

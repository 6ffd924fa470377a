// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placing pending jobs on agents.
//!
//! A pass plans placements from one consistent read, then commits each in
//! its own transaction that re-validates the job and agent. A placement
//! invalidated in between is a conflict; the pass is re-planned a bounded
//! number of times.

use super::Allocator;
use rp_core::{Agent, AgentId, AgentPool, AgentPoolId, Clock, Error, Job, JobSpec, JobStatus};
use rp_storage::Store;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub job: JobSpec,
    pub agent_id: AgentId,
}

/// Pick the agent for `job`: allocatable, with spare capacity, in a pool that
/// serves the job's workspace (and is the workspace's pool, if pinned).
/// Fewest current jobs wins, then the most recent ping, then the lowest ID.
pub fn select_agent<'a>(
    job: &Job,
    agents: &'a [Agent],
    pools: &HashMap<AgentPoolId, AgentPool>,
) -> Option<&'a Agent> {
    agents
        .iter()
        .filter(|agent| eligible(job, agent, pools))
        .min_by(|a, b| rank(a, b))
}

fn eligible(job: &Job, agent: &Agent, pools: &HashMap<AgentPoolId, AgentPool>) -> bool {
    if !agent.can_allocate() {
        return false;
    }
    if job
        .agent_pool_id
        .as_ref()
        .is_some_and(|pinned| pinned != &agent.agent_pool_id)
    {
        return false;
    }
    pools
        .get(&agent.agent_pool_id)
        .is_some_and(|pool| pool.serves(&job.workspace_id, &job.organization))
}

fn rank(a: &Agent, b: &Agent) -> Ordering {
    a.current_jobs
        .cmp(&b.current_jobs)
        .then_with(|| b.last_ping_at_ms.cmp(&a.last_ping_at_ms))
        .then_with(|| a.id.cmp(&b.id))
}

impl<S: Store, C: Clock> Allocator<S, C> {
    /// Allocate every placeable pending job, oldest first.
    pub fn allocate_pending(&self) -> Result<Vec<Allocation>, Error> {
        let mut allocated = Vec::new();
        let mut attempt = 0;
        loop {
            let (mut pending, mut agents, pools) = self.store.tx(|tx| {
                Ok((
                    tx.filter::<Job>(|j| j.status == JobStatus::Pending),
                    tx.list::<Agent>(),
                    tx.list::<AgentPool>(),
                ))
            })?;
            if pending.is_empty() {
                return Ok(allocated);
            }
            pending.sort_by(|a, b| {
                a.created_at_ms
                    .cmp(&b.created_at_ms)
                    .then_with(|| a.spec.cmp(&b.spec))
            });
            let pools: HashMap<AgentPoolId, AgentPool> =
                pools.into_iter().map(|p| (p.id.clone(), p)).collect();

            let mut plan = Vec::new();
            for job in &pending {
                let Some(idx) = select_agent(job, &agents, &pools)
                    .and_then(|chosen| agents.iter().position(|a| a.id == chosen.id))
                else {
                    debug!(job = %job.spec, "no eligible agent, job stays pending");
                    continue;
                };
                // Count the planned job against the agent for the rest of the pass.
                agents[idx].current_jobs += 1;
                plan.push(Allocation {
                    job: job.spec.clone(),
                    agent_id: agents[idx].id.clone(),
                });
            }
            if plan.is_empty() {
                return Ok(allocated);
            }

            let mut conflicted = false;
            for allocation in plan {
                match self.commit_allocation(&allocation) {
                    Ok(()) => {
                        info!(job = %allocation.job, agent_id = %allocation.agent_id, "job allocated");
                        allocated.push(allocation);
                    }
                    Err(e) if e.is_transient() => {
                        debug!(job = %allocation.job, error = %e, "allocation conflict");
                        conflicted = true;
                    }
                    Err(e) => return Err(e),
                }
            }
            if !conflicted {
                return Ok(allocated);
            }
            attempt += 1;
            if attempt > self.config.max_conflict_retries {
                warn!(attempts = attempt, "allocation still conflicting, deferring");
                return Ok(allocated);
            }
        }
    }

    fn commit_allocation(&self, allocation: &Allocation) -> Result<(), Error> {
        let key = allocation.job.key();
        self.store.tx(|tx| {
            let mut job = match tx.find::<Job>(&key) {
                Some(job) if job.status == JobStatus::Pending => job,
                _ => return Err(Error::conflict("job", key.as_str())),
            };
            let mut agent = match tx.find::<Agent>(allocation.agent_id.as_str()) {
                Some(agent) => agent,
                None => return Err(Error::conflict("agent", allocation.agent_id.as_str())),
            };
            let pool = tx.find::<AgentPool>(agent.agent_pool_id.as_str());
            let pools: HashMap<AgentPoolId, AgentPool> =
                pool.into_iter().map(|p| (p.id.clone(), p)).collect();
            if !eligible(&job, &agent, &pools) {
                return Err(Error::conflict("agent", allocation.agent_id.as_str()));
            }

            job.allocate(agent.id.clone())?;
            agent.current_jobs += 1;
            tx.update(job)?;
            tx.update(agent)?;
            Ok(())
        })
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job/agent allocator.
//!
//! Owns agents, pools, tokens, and jobs. Agents pull work: they register
//! with a pool token, heartbeat, poll for allocated and signaled jobs, and
//! report start and finish. Allocation itself is server-side and runs after
//! every change that could make a pending job placeable.

mod agents;
mod allocation;
mod jobs;
mod pools;
mod reaper;
mod tokens;

pub use allocation::{select_agent, Allocation};
pub(crate) use jobs::{finish_run_phase, set_signal};
pub use jobs::StartedJob;
pub use pools::{CreatePoolOptions, UpdatePoolOptions};
pub use reaper::{ReapReport, ReaperConfig};

use rp_core::{Agent, AgentId, AgentPoolId, AgentTokenId, Clock, Error, IdGen, JobStatus, UuidIdGen};
use rp_storage::{Store, Tx};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Passes over a lost allocation race before giving up until the next trigger.
    pub max_conflict_retries: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
        }
    }
}

/// Caller identity established by an agent pool token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSubject {
    pub pool_id: AgentPoolId,
    pub token_id: AgentTokenId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAgentOptions {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub max_jobs: u32,
    pub ip_address: IpAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishJobOptions {
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl FinishJobOptions {
    pub fn finished() -> Self {
        Self {
            status: JobStatus::Finished,
            error: None,
        }
    }

    pub fn errored(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Errored,
            error: Some(error.into()),
        }
    }

    pub fn canceled() -> Self {
        Self {
            status: JobStatus::Canceled,
            error: None,
        }
    }
}

pub struct Allocator<S: Store, C: Clock> {
    store: S,
    clock: C,
    ids: Arc<dyn IdGen>,
    config: AllocatorConfig,
}

impl<S: Store, C: Clock> Allocator<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self::with_id_gen(store, clock, Arc::new(UuidIdGen))
    }

    pub fn with_id_gen(store: S, clock: C, ids: Arc<dyn IdGen>) -> Self {
        Self {
            store,
            clock,
            ids,
            config: AllocatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Load an agent on behalf of `subject`, which must own its pool.
    fn agent_for(tx: &Tx<'_>, subject: &PoolSubject, agent_id: &AgentId) -> Result<Agent, Error> {
        let agent = tx.get::<Agent>(agent_id.as_str())?;
        if agent.agent_pool_id != subject.pool_id {
            return Err(Error::AccessNotPermitted);
        }
        Ok(agent)
    }

    /// Place pending jobs after a state change. Failures are logged: the
    /// next trigger or sweep retries.
    fn trigger_allocation(&self) {
        if let Err(e) = self.allocate_pending() {
            warn!(error = %e, "allocation pass failed");
        }
    }
}

#[cfg(test)]
#[path = "../allocator_tests/mod.rs"]
mod tests;

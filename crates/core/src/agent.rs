// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agents, agent pools, and pool tokens

use crate::error::Error;
use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

crate::define_id! {
    /// Unique identifier for a registered agent.
    pub struct AgentId;
}

crate::define_id! {
    /// Unique identifier for an agent pool.
    pub struct AgentPoolId;
}

crate::define_id! {
    /// Unique identifier for an agent pool token.
    pub struct AgentTokenId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    /// Heartbeats stopped; set by the server, cleared by the next heartbeat.
    Unknown,
    Errored,
    Exited,
}

impl AgentStatus {
    /// Whether new jobs may be allocated to an agent in this status.
    pub fn is_allocatable(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Busy)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Errored | AgentStatus::Exited)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Unknown => "unknown",
            AgentStatus::Errored => "errored",
            AgentStatus::Exited => "exited",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub version: String,
    pub max_jobs: u32,
    pub current_jobs: u32,
    pub status: AgentStatus,
    pub agent_pool_id: AgentPoolId,
    pub ip_address: IpAddr,
    pub last_ping_at_ms: u64,
    pub last_status_at_ms: u64,
}

impl Agent {
    pub fn has_capacity(&self) -> bool {
        self.current_jobs < self.max_jobs
    }

    pub fn can_allocate(&self) -> bool {
        self.status.is_allocatable() && self.has_capacity()
    }

    /// Apply a heartbeat reported by the agent itself.
    pub fn report_status(&mut self, status: AgentStatus, now_ms: u64) -> Result<(), Error> {
        if self.status.is_terminal() {
            return Err(Error::validation(format!(
                "agent {} has already {}",
                self.id, self.status
            )));
        }
        if status == AgentStatus::Unknown {
            return Err(Error::validation("agents cannot report status unknown"));
        }
        self.last_ping_at_ms = now_ms;
        if status != self.status {
            self.status = status;
            self.last_status_at_ms = now_ms;
        }
        Ok(())
    }

    /// Mark a silent agent. Returns `false` when the status did not change.
    pub fn mark_unknown(&mut self, now_ms: u64) -> bool {
        if !self.status.is_allocatable() {
            return false;
        }
        self.status = AgentStatus::Unknown;
        self.last_status_at_ms = now_ms;
        true
    }

    pub fn release_slot(&mut self) {
        self.current_jobs = self.current_jobs.saturating_sub(1);
    }

    pub fn tombstone(id: AgentId) -> Self {
        Self {
            id,
            name: String::new(),
            version: String::new(),
            max_jobs: 0,
            current_jobs: 0,
            status: AgentStatus::Exited,
            agent_pool_id: AgentPoolId::new(""),
            ip_address: IpAddr::from([0, 0, 0, 0]),
            last_ping_at_ms: 0,
            last_status_at_ms: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPool {
    pub id: AgentPoolId,
    pub name: String,
    pub organization: String,
    /// Serve every workspace in the organization.
    pub organization_scoped: bool,
    /// Workspaces served when not organization scoped.
    #[serde(default)]
    pub allowed_workspaces: BTreeSet<WorkspaceId>,
    pub created_at_ms: u64,
}

impl AgentPool {
    pub fn serves(&self, workspace_id: &WorkspaceId, organization: &str) -> bool {
        if self.organization != organization {
            return false;
        }
        self.organization_scoped || self.allowed_workspaces.contains(workspace_id)
    }
}

/// Credential minted against one pool. Only the digest of the secret is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentToken {
    pub id: AgentTokenId,
    pub agent_pool_id: AgentPoolId,
    pub description: String,
    pub token_hash: String,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

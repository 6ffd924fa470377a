// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jobs: one phase of one run, leased to at most one agent

use crate::agent::{AgentId, AgentPoolId};
use crate::error::Error;
use crate::run::{Phase, RunId};
use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};

/// Identifies a job by its run and phase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobSpec {
    pub run_id: RunId,
    pub phase: Phase,
}

impl JobSpec {
    pub fn new(run_id: impl Into<RunId>, phase: Phase) -> Self {
        Self {
            run_id: run_id.into(),
            phase,
        }
    }

    /// Storage key, unique per (run, phase).
    pub fn key(&self) -> String {
        format!("{}/{}", self.run_id, self.phase)
    }

    pub fn parse(key: &str) -> Result<Self, Error> {
        let (run_id, phase) = key
            .rsplit_once('/')
            .ok_or_else(|| Error::validation(format!("malformed job spec {:?}", key)))?;
        if run_id.is_empty() {
            return Err(Error::validation(format!("malformed job spec {:?}", key)));
        }
        Ok(Self::new(run_id, phase.parse()?))
    }
}

impl std::fmt::Display for JobSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.run_id, self.phase)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Allocated,
    Running,
    Finished,
    Errored,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Errored | JobStatus::Canceled
        )
    }

    /// Whether a job holds a slot on its agent.
    pub fn is_leased(&self) -> bool {
        matches!(self, JobStatus::Allocated | JobStatus::Running)
    }

    fn can_transition(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Allocated)
                | (Pending, Canceled)
                | (Allocated, Running)
                | (Allocated, Pending)
                | (Allocated, Canceled)
                | (Allocated, Errored)
                | (Running, Finished)
                | (Running, Errored)
                | (Running, Canceled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Allocated => "allocated",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Errored => "errored",
            JobStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Cooperative cancellation request delivered to the owning agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Cancel,
    ForceCancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub spec: JobSpec,
    pub status: JobStatus,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Pool the job is restricted to, from the workspace.
    #[serde(default)]
    pub agent_pool_id: Option<AgentPoolId>,
    pub workspace_id: WorkspaceId,
    pub organization: String,
    /// Pending cancellation request, cleared once delivered.
    #[serde(default)]
    pub signaled: Option<Signal>,
    #[serde(default)]
    pub error: Option<String>,
    /// Digest of the per-job token while the job runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_hash: Option<String>,
    pub created_at_ms: u64,
}

impl Job {
    pub fn new(
        spec: JobSpec,
        workspace_id: WorkspaceId,
        organization: impl Into<String>,
        agent_pool_id: Option<AgentPoolId>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            spec,
            status: JobStatus::Pending,
            agent_id: None,
            agent_pool_id,
            workspace_id,
            organization: organization.into(),
            signaled: None,
            error: None,
            token_hash: None,
            created_at_ms,
        }
    }

    pub fn key(&self) -> String {
        self.spec.key()
    }

    pub fn is_owned_by(&self, agent_id: &AgentId) -> bool {
        self.agent_id.as_ref() == Some(agent_id)
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), Error> {
        if !self.status.can_transition(to) {
            return Err(Error::validation(format!(
                "job {} cannot move from {} to {}",
                self.spec, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn allocate(&mut self, agent_id: AgentId) -> Result<(), Error> {
        self.transition(JobStatus::Allocated)?;
        self.agent_id = Some(agent_id);
        Ok(())
    }

    /// Hand an allocated job back to the pending pool.
    pub fn release(&mut self) -> Result<(), Error> {
        self.transition(JobStatus::Pending)?;
        self.agent_id = None;
        self.signaled = None;
        Ok(())
    }

    pub fn start(&mut self, agent_id: &AgentId) -> Result<(), Error> {
        if !self.is_owned_by(agent_id) {
            return Err(Error::AccessNotPermitted);
        }
        self.transition(JobStatus::Running)
    }

    /// Move to a terminal status, recording `error` if given.
    pub fn finish(&mut self, status: JobStatus, error: Option<String>) -> Result<(), Error> {
        if !status.is_terminal() {
            return Err(Error::validation(format!(
                "{} is not a finishing job status",
                status
            )));
        }
        self.transition(status)?;
        self.error = error;
        self.signaled = None;
        self.token_hash = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! How an agent talks to the control plane

mod inproc;
mod remote;

pub use inproc::InProcClient;
pub use remote::RemoteClient;

use async_trait::async_trait;
use rp_core::{Agent, AgentId, AgentStatus, ErrorKind, Job, JobSpec, JobStatus};
use rp_daemon::ProtocolError;
use rp_engine::StartedJob;
use thiserror::Error;

/// Errors from agent operations
#[derive(Debug, Error)]
pub enum ClientError {
    /// The control plane refused the operation.
    #[error("{kind}: {message}")]
    Rejected { kind: ErrorKind, message: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<rp_core::Error> for ClientError {
    fn from(e: rp_core::Error) -> Self {
        ClientError::Rejected {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// What an agent tells the control plane about itself at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub version: String,
    pub max_jobs: u32,
}

/// The five operations an agent performs, authenticated by its pool token.
#[async_trait]
pub trait AgentClient: Send + Sync + 'static {
    async fn register(&self, registration: &Registration) -> Result<Agent, ClientError>;

    /// Heartbeat
    async fn update_status(&self, agent_id: &AgentId, status: AgentStatus)
        -> Result<Agent, ClientError>;

    /// Allocated jobs plus running jobs carrying a signal.
    async fn get_jobs(&self, agent_id: &AgentId) -> Result<Vec<Job>, ClientError>;

    async fn start_job(&self, agent_id: &AgentId, spec: &JobSpec)
        -> Result<StartedJob, ClientError>;

    async fn finish_job(
        &self,
        agent_id: &AgentId,
        spec: &JobSpec,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<Job, ClientError>;
}

#[cfg(test)]
#[path = "../client_tests.rs"]
mod tests;

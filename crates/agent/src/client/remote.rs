// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent operations over the daemon wire protocol

use std::time::Duration;

use async_trait::async_trait;
use rp_core::{Agent, AgentId, AgentStatus, Job, JobSpec, JobStatus};
use rp_daemon::{AgentOp, DaemonClient, Request, Response};
use rp_engine::StartedJob;

use super::{AgentClient, ClientError, Registration};

pub struct RemoteClient {
    daemon: DaemonClient,
    token: String,
}

impl RemoteClient {
    pub fn new(addr: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            daemon: DaemonClient::new(addr).with_timeout(timeout),
            token: token.into(),
        }
    }

    async fn call(&self, op: AgentOp) -> Result<Response, ClientError> {
        let request = Request::Agent {
            token: self.token.clone(),
            op,
        };
        match self.daemon.send(&request).await? {
            Response::Error { kind, message } => Err(ClientError::Rejected { kind, message }),
            response => Ok(response),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    ClientError::UnexpectedResponse(format!("{:?}", response))
}

#[async_trait]
impl AgentClient for RemoteClient {
    async fn register(&self, registration: &Registration) -> Result<Agent, ClientError> {
        match self
            .call(AgentOp::Register {
                name: registration.name.clone(),
                version: registration.version.clone(),
                max_jobs: registration.max_jobs,
            })
            .await?
        {
            Response::Agent { agent } => Ok(agent),
            other => Err(unexpected(other)),
        }
    }

    async fn update_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> Result<Agent, ClientError> {
        match self
            .call(AgentOp::UpdateStatus {
                agent_id: agent_id.clone(),
                status,
            })
            .await?
        {
            Response::Agent { agent } => Ok(agent),
            other => Err(unexpected(other)),
        }
    }

    async fn get_jobs(&self, agent_id: &AgentId) -> Result<Vec<Job>, ClientError> {
        match self
            .call(AgentOp::GetJobs {
                agent_id: agent_id.clone(),
            })
            .await?
        {
            Response::Jobs { jobs } => Ok(jobs),
            other => Err(unexpected(other)),
        }
    }

    async fn start_job(&self, agent_id: &AgentId, spec: &JobSpec) -> Result<StartedJob, ClientError> {
        match self
            .call(AgentOp::StartJob {
                agent_id: agent_id.clone(),
                spec: spec.clone(),
            })
            .await?
        {
            Response::StartedJob { started } => Ok(*started),
            other => Err(unexpected(other)),
        }
    }

    async fn finish_job(
        &self,
        agent_id: &AgentId,
        spec: &JobSpec,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<Job, ClientError> {
        match self
            .call(AgentOp::FinishJob {
                agent_id: agent_id.clone(),
                spec: spec.clone(),
                status,
                error,
            })
            .await?
        {
            Response::Job { job } => Ok(job),
            other => Err(unexpected(other)),
        }
    }
}

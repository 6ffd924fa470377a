// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Direct allocator calls, for agents embedded next to the engine

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use rp_core::{Agent, AgentId, AgentStatus, Clock, Job, JobSpec, JobStatus};
use rp_engine::{Allocator, FinishJobOptions, PoolSubject, RegisterAgentOptions, StartedJob};
use rp_storage::Store;

use super::{AgentClient, ClientError, Registration};

pub struct InProcClient<S: Store, C: Clock> {
    allocator: Arc<Allocator<S, C>>,
    subject: PoolSubject,
    ip_address: IpAddr,
}

impl<S: Store, C: Clock> InProcClient<S, C> {
    /// Authenticate `token` once; every later call acts as that pool.
    pub fn connect(allocator: Arc<Allocator<S, C>>, token: &str) -> Result<Self, ClientError> {
        let subject = allocator.authenticate(token)?;
        Ok(Self {
            allocator,
            subject,
            ip_address: IpAddr::from([127, 0, 0, 1]),
        })
    }

    pub fn subject(&self) -> &PoolSubject {
        &self.subject
    }
}

#[async_trait]
impl<S: Store, C: Clock> AgentClient for InProcClient<S, C> {
    async fn register(&self, registration: &Registration) -> Result<Agent, ClientError> {
        Ok(self.allocator.register_agent(
            &self.subject,
            RegisterAgentOptions {
                name: registration.name.clone(),
                version: registration.version.clone(),
                max_jobs: registration.max_jobs,
                ip_address: self.ip_address,
            },
        )?)
    }

    async fn update_status(
        &self,
        agent_id: &AgentId,
        status: AgentStatus,
    ) -> Result<Agent, ClientError> {
        Ok(self
            .allocator
            .update_agent_status(&self.subject, agent_id, status)?)
    }

    async fn get_jobs(&self, agent_id: &AgentId) -> Result<Vec<Job>, ClientError> {
        Ok(self.allocator.get_agent_jobs(&self.subject, agent_id)?)
    }

    async fn start_job(&self, agent_id: &AgentId, spec: &JobSpec) -> Result<StartedJob, ClientError> {
        Ok(self.allocator.start_job(&self.subject, agent_id, spec)?)
    }

    async fn finish_job(
        &self,
        agent_id: &AgentId,
        spec: &JobSpec,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<Job, ClientError> {
        Ok(self.allocator.finish_job(
            &self.subject,
            agent_id,
            spec,
            FinishJobOptions { status, error },
        )?)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between the daemon, agents, and admin clients.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

use rp_core::{
    Agent, AgentPool, AgentPoolId, AgentStatus, AgentToken, AgentTokenId, AgentId, ErrorKind, Job,
    JobSpec, JobStatus, Run, RunId, Signal, Workspace, WorkspaceId,
};
use rp_engine::{
    CreatePoolOptions, CreateRunOptions, CreateWorkspaceOptions, StartedJob, UpdatePoolOptions,
    UpdateWorkspaceOptions,
};
use serde::{Deserialize, Serialize};

#[path = "protocol_wire.rs"]
mod wire;
pub use wire::{
    decode, encode, read_message, read_request, read_response, write_message, write_request,
    write_response, ProtocolError, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

/// Request to the daemon. One request per connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Agent operation, authenticated by an agent pool token
    Agent { token: String, op: AgentOp },

    /// Context for a running job, authenticated by the job's own token
    JobInfo { token: String },

    /// Administrative operation, authenticated by the admin token
    Admin {
        #[serde(default)]
        token: Option<String>,
        op: AdminOp,
    },

    /// Daemon counters
    Status,
}

impl Request {
    /// Short name for logs. Never includes tokens.
    pub fn label(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Hello { .. } => "hello",
            Request::Status => "status",
            Request::JobInfo { .. } => "job_info",
            Request::Agent { op, .. } => match op {
                AgentOp::Register { .. } => "agent.register",
                AgentOp::UpdateStatus { .. } => "agent.update_status",
                AgentOp::GetJobs { .. } => "agent.get_jobs",
                AgentOp::StartJob { .. } => "agent.start_job",
                AgentOp::FinishJob { .. } => "agent.finish_job",
            },
            Request::Admin { .. } => "admin",
        }
    }

    /// Heartbeats and polls, logged at debug level.
    pub fn is_frequent(&self) -> bool {
        matches!(
            self,
            Request::Ping
                | Request::Status
                | Request::Agent {
                    op: AgentOp::UpdateStatus { .. } | AgentOp::GetJobs { .. },
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AgentOp {
    Register {
        name: String,
        #[serde(default)]
        version: String,
        max_jobs: u32,
    },
    UpdateStatus {
        agent_id: AgentId,
        status: AgentStatus,
    },
    GetJobs {
        agent_id: AgentId,
    },
    StartJob {
        agent_id: AgentId,
        spec: JobSpec,
    },
    FinishJob {
        agent_id: AgentId,
        spec: JobSpec,
        status: JobStatus,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AdminOp {
    CreateWorkspace {
        options: CreateWorkspaceOptions,
    },
    UpdateWorkspace {
        id: WorkspaceId,
        options: UpdateWorkspaceOptions,
    },
    DeleteWorkspace {
        id: WorkspaceId,
    },
    LockWorkspace {
        id: WorkspaceId,
        user: String,
    },
    UnlockWorkspace {
        id: WorkspaceId,
        user: String,
        #[serde(default)]
        force: bool,
    },
    GetWorkspace {
        id: WorkspaceId,
    },
    ListWorkspaces {
        #[serde(default)]
        organization: Option<String>,
    },

    CreateRun {
        options: CreateRunOptions,
    },
    ApplyRun {
        id: RunId,
    },
    DiscardRun {
        id: RunId,
    },
    CancelRun {
        id: RunId,
        #[serde(default)]
        force: bool,
    },
    GetRun {
        id: RunId,
    },
    ListRuns {
        #[serde(default)]
        workspace_id: Option<WorkspaceId>,
    },

    CreatePool {
        options: CreatePoolOptions,
    },
    UpdatePool {
        id: AgentPoolId,
        options: UpdatePoolOptions,
    },
    DeletePool {
        id: AgentPoolId,
    },
    AddAllowedWorkspace {
        pool_id: AgentPoolId,
        workspace_id: WorkspaceId,
    },
    RemoveAllowedWorkspace {
        pool_id: AgentPoolId,
        workspace_id: WorkspaceId,
    },
    GetPool {
        id: AgentPoolId,
    },
    ListPools {
        #[serde(default)]
        organization: Option<String>,
    },

    CreateAgentToken {
        pool_id: AgentPoolId,
        #[serde(default)]
        description: String,
    },
    DeleteAgentToken {
        id: AgentTokenId,
    },
    ListAgentTokens {
        pool_id: AgentPoolId,
    },

    GetAgent {
        id: AgentId,
    },
    ListAgents {
        #[serde(default)]
        pool_id: Option<AgentPoolId>,
    },
    DeregisterAgent {
        id: AgentId,
    },

    GetJob {
        spec: JobSpec,
    },
    ListJobs,
    SignalJob {
        spec: JobSpec,
        signal: Signal,
    },

    /// Stop the daemon
    Shutdown,
}

/// Response from the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon is shutting down
    ShuttingDown,

    /// The operation failed
    Error { kind: ErrorKind, message: String },

    Status {
        version: String,
        uptime_secs: u64,
        workspaces: usize,
        active_runs: usize,
        pending_jobs: usize,
        running_jobs: usize,
        agents: usize,
    },

    Agent { agent: Agent },
    Agents { agents: Vec<Agent> },

    Job { job: Job },
    Jobs { jobs: Vec<Job> },
    StartedJob { started: Box<StartedJob> },
    JobInfo {
        job: Job,
        run: Run,
        workspace: Workspace,
    },

    Workspace { workspace: Workspace },
    Workspaces { workspaces: Vec<Workspace> },

    Run { run: Run },
    Runs { runs: Vec<Run> },

    Pool { pool: AgentPool },
    Pools { pools: Vec<AgentPool> },

    /// A token; `secret` is only present when it was just created.
    Token {
        token: AgentToken,
        #[serde(default)]
        secret: Option<String>,
    },
    Tokens { tokens: Vec<AgentToken> },
}

impl Response {
    pub fn error(err: &rp_core::Error) -> Self {
        Response::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-facing operations, authenticated by a pool token or a job token

use std::net::IpAddr;

use rp_core::Error;
use rp_engine::{FinishJobOptions, RegisterAgentOptions};

use super::ListenCtx;
use crate::protocol::{AgentOp, Response};

pub(super) fn handle(
    ctx: &ListenCtx,
    token: &str,
    op: AgentOp,
    peer_ip: IpAddr,
) -> Result<Response, Error> {
    let subject = ctx.allocator.authenticate(token)?;
    let allocator = &ctx.allocator;
    match op {
        AgentOp::Register {
            name,
            version,
            max_jobs,
        } => {
            let agent = allocator.register_agent(
                &subject,
                RegisterAgentOptions {
                    name,
                    version,
                    max_jobs,
                    ip_address: peer_ip,
                },
            )?;
            Ok(Response::Agent { agent })
        }
        AgentOp::UpdateStatus { agent_id, status } => {
            let agent = allocator.update_agent_status(&subject, &agent_id, status)?;
            Ok(Response::Agent { agent })
        }
        AgentOp::GetJobs { agent_id } => {
            let jobs = allocator.get_agent_jobs(&subject, &agent_id)?;
            Ok(Response::Jobs { jobs })
        }
        AgentOp::StartJob { agent_id, spec } => {
            let started = allocator.start_job(&subject, &agent_id, &spec)?;
            Ok(Response::StartedJob {
                started: Box::new(started),
            })
        }
        AgentOp::FinishJob {
            agent_id,
            spec,
            status,
            error,
        } => {
            let job =
                allocator.finish_job(&subject, &agent_id, &spec, FinishJobOptions { status, error })?;
            Ok(Response::Job { job })
        }
    }
}

/// Context for the job a per-job token was issued to.
pub(super) fn job_info(ctx: &ListenCtx, token: &str) -> Result<Response, Error> {
    let job = ctx.allocator.authenticate_job(token)?;
    let run = ctx.runs.get_run(&job.spec.run_id)?;
    let workspace = ctx.workspaces.get_workspace(&job.workspace_id)?;
    Ok(Response::JobInfo {
        job,
        run,
        workspace,
    })
}

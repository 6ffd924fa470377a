// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative operations

use rp_core::Error;
use tracing::info;

use super::ListenCtx;
use crate::protocol::{AdminOp, Response};

pub(super) fn handle(ctx: &ListenCtx, op: AdminOp) -> Result<Response, Error> {
    let allocator = &ctx.allocator;
    let runs = &ctx.runs;
    let workspaces = &ctx.workspaces;
    let response = match op {
        // Workspaces
        AdminOp::CreateWorkspace { options } => Response::Workspace {
            workspace: workspaces.create_workspace(options)?,
        },
        AdminOp::UpdateWorkspace { id, options } => Response::Workspace {
            workspace: workspaces.update_workspace(&id, options)?,
        },
        AdminOp::DeleteWorkspace { id } => Response::Workspace {
            workspace: workspaces.delete_workspace(&id)?,
        },
        AdminOp::LockWorkspace { id, user } => Response::Workspace {
            workspace: workspaces.lock_workspace(&id, &user)?,
        },
        AdminOp::UnlockWorkspace { id, user, force } => Response::Workspace {
            workspace: workspaces.unlock_workspace(&id, &user, force)?,
        },
        AdminOp::GetWorkspace { id } => Response::Workspace {
            workspace: workspaces.get_workspace(&id)?,
        },
        AdminOp::ListWorkspaces { organization } => Response::Workspaces {
            workspaces: workspaces.list_workspaces(organization.as_deref())?,
        },

        // Runs
        AdminOp::CreateRun { options } => Response::Run {
            run: runs.create_run(options)?,
        },
        AdminOp::ApplyRun { id } => Response::Run {
            run: runs.apply_run(&id)?,
        },
        AdminOp::DiscardRun { id } => Response::Run {
            run: runs.discard_run(&id)?,
        },
        AdminOp::CancelRun { id, force } => Response::Run {
            run: runs.cancel_run(&id, force)?,
        },
        AdminOp::GetRun { id } => Response::Run {
            run: runs.get_run(&id)?,
        },
        AdminOp::ListRuns { workspace_id } => Response::Runs {
            runs: runs.list_runs(workspace_id.as_ref())?,
        },

        // Pools
        AdminOp::CreatePool { options } => Response::Pool {
            pool: allocator.create_pool(options)?,
        },
        AdminOp::UpdatePool { id, options } => Response::Pool {
            pool: allocator.update_pool(&id, options)?,
        },
        AdminOp::DeletePool { id } => Response::Pool {
            pool: allocator.delete_pool(&id)?,
        },
        AdminOp::AddAllowedWorkspace {
            pool_id,
            workspace_id,
        } => Response::Pool {
            pool: allocator.add_allowed_workspace(&pool_id, &workspace_id)?,
        },
        AdminOp::RemoveAllowedWorkspace {
            pool_id,
            workspace_id,
        } => Response::Pool {
            pool: allocator.remove_allowed_workspace(&pool_id, &workspace_id)?,
        },
        AdminOp::GetPool { id } => Response::Pool {
            pool: allocator.get_pool(&id)?,
        },
        AdminOp::ListPools { organization } => Response::Pools {
            pools: allocator.list_pools(organization.as_deref())?,
        },

        // Tokens
        AdminOp::CreateAgentToken {
            pool_id,
            description,
        } => {
            let (token, secret) = allocator.create_agent_token(&pool_id, description)?;
            Response::Token {
                token,
                secret: Some(secret),
            }
        }
        AdminOp::DeleteAgentToken { id } => Response::Token {
            token: allocator.delete_agent_token(&id)?,
            secret: None,
        },
        AdminOp::ListAgentTokens { pool_id } => Response::Tokens {
            tokens: allocator.list_agent_tokens(&pool_id)?,
        },

        // Agents
        AdminOp::GetAgent { id } => Response::Agent {
            agent: allocator.get_agent(&id)?,
        },
        AdminOp::ListAgents { pool_id } => Response::Agents {
            agents: allocator.list_agents(pool_id.as_ref())?,
        },
        AdminOp::DeregisterAgent { id } => Response::Agent {
            agent: allocator.deregister_agent(&id)?,
        },

        // Jobs
        AdminOp::GetJob { spec } => Response::Job {
            job: allocator.get_job(&spec)?,
        },
        AdminOp::ListJobs => Response::Jobs {
            jobs: allocator.list_jobs()?,
        },
        AdminOp::SignalJob { spec, signal } => Response::Job {
            job: allocator.signal_job(&spec, signal)?,
        },

        AdminOp::Shutdown => {
            info!("shutdown requested");
            ctx.shutdown.cancel();
            Response::ShuttingDown
        }
    };
    Ok(response)
}

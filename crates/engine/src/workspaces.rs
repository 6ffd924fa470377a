// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace lifecycle and manual locking

use rp_core::workspace::validate_name;
use rp_core::{
    AgentPool, AgentPoolId, Clock, Error, IdGen, Job, JobStatus, LockHolder, Run, RunStatus,
    Workspace, WorkspaceId,
};
use rp_storage::{Store, Tx};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkspaceOptions {
    pub name: String,
    pub organization: String,
    #[serde(default)]
    pub agent_pool_id: Option<AgentPoolId>,
    #[serde(default)]
    pub speculative_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWorkspaceOptions {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some(None)` unpins the workspace from its pool.
    #[serde(default)]
    pub agent_pool_id: Option<Option<AgentPoolId>>,
    #[serde(default)]
    pub speculative_enabled: Option<bool>,
}

pub struct Workspaces<S: Store, C: Clock> {
    store: S,
    clock: C,
    ids: Arc<dyn IdGen>,
}

impl<S: Store, C: Clock> Workspaces<S, C> {
    pub fn new(store: S, clock: C, ids: Arc<dyn IdGen>) -> Self {
        Self { store, clock, ids }
    }

    pub fn create_workspace(&self, opts: CreateWorkspaceOptions) -> Result<Workspace, Error> {
        validate_name(&opts.name)?;
        if opts.organization.trim().is_empty() {
            return Err(Error::validation("workspace organization is required"));
        }
        let mut workspace = Workspace::new(
            WorkspaceId::new(self.ids.next("ws")),
            opts.name,
            opts.organization,
            self.clock.epoch_ms(),
        );
        workspace.agent_pool_id = opts.agent_pool_id;
        if let Some(speculative) = opts.speculative_enabled {
            workspace.speculative_enabled = speculative;
        }

        self.store.tx(|tx| {
            check_unique_name(tx, &workspace)?;
            check_pool_serves(tx, &workspace)?;
            tx.insert(workspace.clone())
        })?;
        info!(workspace_id = %workspace.id, name = %workspace.name, org = %workspace.organization, "workspace created");
        Ok(workspace)
    }

    pub fn update_workspace(
        &self,
        workspace_id: &WorkspaceId,
        opts: UpdateWorkspaceOptions,
    ) -> Result<Workspace, Error> {
        let workspace = self.store.tx(|tx| {
            let mut workspace = tx.get_for_update::<Workspace>(workspace_id.as_str())?;
            if let Some(name) = opts.name {
                validate_name(&name)?;
                workspace.name = name;
                check_unique_name(tx, &workspace)?;
            }
            if let Some(pool) = opts.agent_pool_id {
                workspace.agent_pool_id = pool;
                check_pool_serves(tx, &workspace)?;
            }
            if let Some(speculative) = opts.speculative_enabled {
                workspace.speculative_enabled = speculative;
            }
            tx.update(workspace.clone())?;
            Ok(workspace)
        })?;
        info!(workspace_id = %workspace_id, "workspace updated");
        Ok(workspace)
    }

    /// Delete a workspace. Refused while an agent holds one of its jobs;
    /// otherwise unfinished runs are canceled and the workspace is dropped
    /// from pool allow-lists.
    pub fn delete_workspace(&self, workspace_id: &WorkspaceId) -> Result<Workspace, Error> {
        let workspace = self.store.tx(|tx| {
            let jobs = tx.filter::<Job>(|j| &j.workspace_id == workspace_id && !j.status.is_terminal());
            if let Some(leased) = jobs.iter().find(|j| j.status.is_leased()) {
                return Err(Error::ForeignKeyViolation {
                    kind: "workspace",
                    id: workspace_id.to_string(),
                    referenced_by: format!("job {}", leased.spec),
                });
            }
            for job in jobs {
                tx.modify::<Job>(&job.key(), |j| {
                    j.finish(JobStatus::Canceled, Some("workspace deleted".to_string()))
                })?;
            }
            for run in tx.filter::<Run>(|r| &r.workspace_id == workspace_id && !r.is_terminal()) {
                tx.modify::<Run>(run.id.as_str(), |r| {
                    r.status = RunStatus::Canceled;
                    Ok(())
                })?;
            }
            for pool in tx.filter::<AgentPool>(|p| p.allowed_workspaces.contains(workspace_id)) {
                tx.modify::<AgentPool>(pool.id.as_str(), |p| {
                    p.allowed_workspaces.remove(workspace_id);
                    Ok(())
                })?;
            }
            tx.delete::<Workspace>(workspace_id.as_str())
        })?;
        info!(workspace_id = %workspace_id, "workspace deleted");
        Ok(workspace)
    }

    pub fn lock_workspace(&self, workspace_id: &WorkspaceId, user: &str) -> Result<Workspace, Error> {
        let workspace = self.store.tx(|tx| {
            tx.modify::<Workspace>(workspace_id.as_str(), |ws| {
                ws.enlock(LockHolder::User(user.to_string()))
            })
        })?;
        info!(workspace_id = %workspace_id, user, "workspace locked");
        Ok(workspace)
    }

    pub fn unlock_workspace(
        &self,
        workspace_id: &WorkspaceId,
        user: &str,
        force: bool,
    ) -> Result<Workspace, Error> {
        let workspace = self.store.tx(|tx| {
            tx.modify::<Workspace>(workspace_id.as_str(), |ws| {
                ws.unlock(&LockHolder::User(user.to_string()), force)
            })
        })?;
        info!(workspace_id = %workspace_id, user, force, "workspace unlocked");
        Ok(workspace)
    }

    pub fn get_workspace(&self, workspace_id: &WorkspaceId) -> Result<Workspace, Error> {
        self.store.tx(|tx| tx.get::<Workspace>(workspace_id.as_str()))
    }

    pub fn list_workspaces(&self, organization: Option<&str>) -> Result<Vec<Workspace>, Error> {
        self.store.tx(|tx| {
            Ok(tx.filter::<Workspace>(|ws| organization.is_none_or(|org| ws.organization == org)))
        })
    }
}

fn check_unique_name(tx: &Tx<'_>, workspace: &Workspace) -> Result<(), Error> {
    let taken = tx
        .filter::<Workspace>(|ws| {
            ws.id != workspace.id
                && ws.organization == workspace.organization
                && ws.name == workspace.name
        })
        .into_iter()
        .next();
    match taken {
        Some(_) => Err(Error::already_exists(
            "workspace",
            format!("{}/{}", workspace.organization, workspace.name),
        )),
        None => Ok(()),
    }
}

fn check_pool_serves(tx: &Tx<'_>, workspace: &Workspace) -> Result<(), Error> {
    let Some(pool_id) = &workspace.agent_pool_id else {
        return Ok(());
    };
    let pool = tx.get::<AgentPool>(pool_id.as_str())?;
    if !pool.serves(&workspace.id, &workspace.organization) {
        return Err(Error::validation(format!(
            "agent pool {} does not serve workspace {}",
            pool.id, workspace.id
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "workspaces_tests.rs"]
mod tests;

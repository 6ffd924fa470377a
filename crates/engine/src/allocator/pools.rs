// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent pool management. Membership changes take an exclusive table lock.

use super::Allocator;
use rp_core::{
    Agent, AgentPool, AgentPoolId, AgentToken, Clock, Error, Workspace, WorkspaceId,
};
use rp_storage::{Store, Table, Tx};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePoolOptions {
    pub name: String,
    pub organization: String,
    #[serde(default)]
    pub organization_scoped: bool,
    #[serde(default)]
    pub allowed_workspaces: Vec<WorkspaceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePoolOptions {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub organization_scoped: Option<bool>,
    #[serde(default)]
    pub allowed_workspaces: Option<Vec<WorkspaceId>>,
}

impl<S: Store, C: Clock> Allocator<S, C> {
    pub fn create_pool(&self, opts: CreatePoolOptions) -> Result<AgentPool, Error> {
        if opts.name.trim().is_empty() {
            return Err(Error::validation("agent pool name is required"));
        }
        if opts.organization.trim().is_empty() {
            return Err(Error::validation("agent pool organization is required"));
        }
        let pool = AgentPool {
            id: AgentPoolId::new(self.ids.next("apool")),
            name: opts.name,
            organization: opts.organization,
            organization_scoped: opts.organization_scoped,
            allowed_workspaces: opts.allowed_workspaces.into_iter().collect(),
            created_at_ms: self.clock.epoch_ms(),
        };
        self.store.lock_table(Table::AgentPools, |tx| {
            check_allowed_workspaces(tx, &pool)?;
            tx.insert(pool.clone())
        })?;
        info!(pool = %pool.id, name = %pool.name, org = %pool.organization, "agent pool created");
        Ok(pool)
    }

    pub fn update_pool(&self, pool_id: &AgentPoolId, opts: UpdatePoolOptions) -> Result<AgentPool, Error> {
        self.change_pool(pool_id, |pool| {
            if let Some(name) = opts.name {
                if name.trim().is_empty() {
                    return Err(Error::validation("agent pool name is required"));
                }
                pool.name = name;
            }
            if let Some(scoped) = opts.organization_scoped {
                pool.organization_scoped = scoped;
            }
            if let Some(allowed) = opts.allowed_workspaces {
                pool.allowed_workspaces = allowed.into_iter().collect();
            }
            Ok(())
        })
    }

    pub fn add_allowed_workspace(
        &self,
        pool_id: &AgentPoolId,
        workspace_id: &WorkspaceId,
    ) -> Result<AgentPool, Error> {
        self.change_pool(pool_id, |pool| {
            pool.allowed_workspaces.insert(workspace_id.clone());
            Ok(())
        })
    }

    pub fn remove_allowed_workspace(
        &self,
        pool_id: &AgentPoolId,
        workspace_id: &WorkspaceId,
    ) -> Result<AgentPool, Error> {
        self.change_pool(pool_id, |pool| {
            if !pool.allowed_workspaces.remove(workspace_id) {
                return Err(Error::not_found("allowed workspace", workspace_id.as_str()));
            }
            Ok(())
        })
    }

    /// Apply a membership change. Workspaces pinned to the pool must still
    /// be served afterwards.
    fn change_pool(
        &self,
        pool_id: &AgentPoolId,
        f: impl FnOnce(&mut AgentPool) -> Result<(), Error>,
    ) -> Result<AgentPool, Error> {
        let pool = self.store.lock_table(Table::AgentPools, |tx| {
            let pool = tx.modify::<AgentPool>(pool_id.as_str(), f)?;
            check_allowed_workspaces(tx, &pool)?;
            if let Some(ws) = tx
                .filter::<Workspace>(|ws| ws.agent_pool_id.as_ref() == Some(pool_id))
                .into_iter()
                .find(|ws| !pool.serves(&ws.id, &ws.organization))
            {
                return Err(Error::ForeignKeyViolation {
                    kind: "agent pool",
                    id: pool_id.to_string(),
                    referenced_by: format!("workspace {}", ws.id),
                });
            }
            Ok(pool)
        })?;
        info!(pool = %pool.id, "agent pool updated");
        self.trigger_allocation();
        Ok(pool)
    }

    /// Delete a pool with its tokens and exited agents.
    pub fn delete_pool(&self, pool_id: &AgentPoolId) -> Result<AgentPool, Error> {
        let pool = self.store.lock_table(Table::AgentPools, |tx| {
            for token in tx.filter::<AgentToken>(|t| &t.agent_pool_id == pool_id) {
                tx.delete::<AgentToken>(token.id.as_str())?;
            }
            for agent in tx.filter::<Agent>(|a| &a.agent_pool_id == pool_id && a.status.is_terminal()) {
                tx.delete::<Agent>(agent.id.as_str())?;
            }
            tx.delete::<AgentPool>(pool_id.as_str())
        })?;
        info!(pool = %pool_id, "agent pool deleted");
        Ok(pool)
    }

    pub fn get_pool(&self, pool_id: &AgentPoolId) -> Result<AgentPool, Error> {
        self.store.tx(|tx| tx.get::<AgentPool>(pool_id.as_str()))
    }

    pub fn list_pools(&self, organization: Option<&str>) -> Result<Vec<AgentPool>, Error> {
        self.store.tx(|tx| {
            Ok(tx.filter::<AgentPool>(|p| organization.is_none_or(|org| p.organization == org)))
        })
    }
}

fn check_allowed_workspaces(tx: &Tx<'_>, pool: &AgentPool) -> Result<(), Error> {
    for workspace_id in &pool.allowed_workspaces {
        let ws = tx.get::<Workspace>(workspace_id.as_str())?;
        if ws.organization != pool.organization {
            return Err(Error::validation(format!(
                "workspace {} belongs to organization {}, not {}",
                ws.id, ws.organization, pool.organization
            )));
        }
    }
    Ok(())
}

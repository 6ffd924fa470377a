// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table definitions and per-record referential rules

use rp_core::{Agent, AgentPool, AgentToken, Error, Job, Run, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tables that carry a change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Workspaces,
    Runs,
    Jobs,
    Agents,
    AgentPools,
    AgentTokens,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Table::Workspaces => "workspaces",
            Table::Runs => "runs",
            Table::Jobs => "jobs",
            Table::Agents => "agents",
            Table::AgentPools => "agent_pools",
            Table::AgentTokens => "agent_tokens",
        };
        f.write_str(s)
    }
}

/// All persisted rows, keyed by primary key.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub workspaces: BTreeMap<String, Workspace>,
    #[serde(default)]
    pub runs: BTreeMap<String, Run>,
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
    #[serde(default)]
    pub agents: BTreeMap<String, Agent>,
    #[serde(default)]
    pub agent_pools: BTreeMap<String, AgentPool>,
    #[serde(default)]
    pub agent_tokens: BTreeMap<String, AgentToken>,
}

/// A row type stored in one of the [`Tables`].
pub trait Record: Clone + Send + Sync + 'static {
    const TABLE: Table;
    /// Human-readable name used in errors.
    const KIND: &'static str;

    fn key(&self) -> String;
    fn rows(tables: &Tables) -> &BTreeMap<String, Self>;
    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<String, Self>;

    /// Referenced rows must exist before this row is written.
    fn check_references(&self, _tables: &Tables) -> Result<(), Error> {
        Ok(())
    }

    /// No other row may still reference this one when it is deleted.
    fn check_delete(_tables: &Tables, _key: &str) -> Result<(), Error> {
        Ok(())
    }
}

fn require<R: Record>(tables: &Tables, key: &str) -> Result<(), Error> {
    if R::rows(tables).contains_key(key) {
        Ok(())
    } else {
        Err(Error::not_found(R::KIND, key))
    }
}

impl Record for Workspace {
    const TABLE: Table = Table::Workspaces;
    const KIND: &'static str = "workspace";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn rows(tables: &Tables) -> &BTreeMap<String, Self> {
        &tables.workspaces
    }

    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<String, Self> {
        &mut tables.workspaces
    }

    fn check_references(&self, tables: &Tables) -> Result<(), Error> {
        match &self.agent_pool_id {
            Some(pool) => require::<AgentPool>(tables, pool.as_str()),
            None => Ok(()),
        }
    }
}

impl Record for Run {
    const TABLE: Table = Table::Runs;
    const KIND: &'static str = "run";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn rows(tables: &Tables) -> &BTreeMap<String, Self> {
        &tables.runs
    }

    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<String, Self> {
        &mut tables.runs
    }

    fn check_references(&self, tables: &Tables) -> Result<(), Error> {
        require::<Workspace>(tables, self.workspace_id.as_str())
    }
}

impl Record for Job {
    const TABLE: Table = Table::Jobs;
    const KIND: &'static str = "job";

    fn key(&self) -> String {
        self.spec.key()
    }

    fn rows(tables: &Tables) -> &BTreeMap<String, Self> {
        &tables.jobs
    }

    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<String, Self> {
        &mut tables.jobs
    }

    fn check_references(&self, tables: &Tables) -> Result<(), Error> {
        require::<Run>(tables, self.spec.run_id.as_str())
    }
}

impl Record for Agent {
    const TABLE: Table = Table::Agents;
    const KIND: &'static str = "agent";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn rows(tables: &Tables) -> &BTreeMap<String, Self> {
        &tables.agents
    }

    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<String, Self> {
        &mut tables.agents
    }

    fn check_references(&self, tables: &Tables) -> Result<(), Error> {
        require::<AgentPool>(tables, self.agent_pool_id.as_str())
    }
}

impl Record for AgentPool {
    const TABLE: Table = Table::AgentPools;
    const KIND: &'static str = "agent pool";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn rows(tables: &Tables) -> &BTreeMap<String, Self> {
        &tables.agent_pools
    }

    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<String, Self> {
        &mut tables.agent_pools
    }

    fn check_delete(tables: &Tables, key: &str) -> Result<(), Error> {
        let violation = |referenced_by: String| Error::ForeignKeyViolation {
            kind: Self::KIND,
            id: key.to_string(),
            referenced_by,
        };
        if let Some(ws) = tables
            .workspaces
            .values()
            .find(|ws| ws.agent_pool_id.as_ref().is_some_and(|p| p == key))
        {
            return Err(violation(format!("workspace {}", ws.id)));
        }
        if let Some(agent) = tables
            .agents
            .values()
            .find(|a| a.agent_pool_id == key && !a.status.is_terminal())
        {
            return Err(violation(format!("agent {}", agent.id)));
        }
        Ok(())
    }
}

impl Record for AgentToken {
    const TABLE: Table = Table::AgentTokens;
    const KIND: &'static str = "agent token";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn rows(tables: &Tables) -> &BTreeMap<String, Self> {
        &tables.agent_tokens
    }

    fn rows_mut(tables: &mut Tables) -> &mut BTreeMap<String, Self> {
        &mut tables.agent_tokens
    }

    fn check_references(&self, tables: &Tables) -> Result<(), Error> {
        require::<AgentPool>(tables, self.agent_pool_id.as_str())
    }
}

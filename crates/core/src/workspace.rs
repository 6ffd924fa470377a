// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace records and locking

use crate::agent::AgentPoolId;
use crate::error::Error;
use crate::run::RunId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a workspace.
    pub struct WorkspaceId;
}

/// Who holds a workspace lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LockHolder {
    /// Locked manually; blocks promotion of queued runs.
    User(String),
    /// Locked by the workspace's current run.
    Run(RunId),
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockHolder::User(user) => write!(f, "user {}", user),
            LockHolder::Run(run) => write!(f, "run {}", run),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub organization: String,
    /// Restricts execution to one pool. When unset any pool serving the
    /// workspace may run its jobs.
    #[serde(default)]
    pub agent_pool_id: Option<AgentPoolId>,
    /// Plan-only runs skip the run queue when enabled.
    #[serde(default = "default_true")]
    pub speculative_enabled: bool,
    #[serde(default)]
    pub lock: Option<LockHolder>,
    #[serde(default)]
    pub current_run_id: Option<RunId>,
    pub created_at_ms: u64,
}

fn default_true() -> bool {
    true
}

impl Workspace {
    pub fn new(
        id: WorkspaceId,
        name: impl Into<String>,
        organization: impl Into<String>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            organization: organization.into(),
            agent_pool_id: None,
            speculative_enabled: true,
            lock: None,
            current_run_id: None,
            created_at_ms,
        }
    }

    /// Deletion payload carrying only the identity of a removed workspace.
    pub fn tombstone(id: WorkspaceId) -> Self {
        Self::new(id, "", "", 0)
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn is_user_locked(&self) -> bool {
        matches!(self.lock, Some(LockHolder::User(_)))
    }

    /// Acquire the lock. A run may take over a lock held by another run;
    /// anything else requires the workspace to be unlocked.
    pub fn enlock(&mut self, holder: LockHolder) -> Result<(), Error> {
        match (&self.lock, &holder) {
            (None, _) => {}
            (Some(LockHolder::Run(_)), LockHolder::Run(_)) => {}
            (Some(current), _) if *current == holder => return Ok(()),
            (Some(current), _) => {
                return Err(Error::validation(format!(
                    "workspace {} already locked by {}",
                    self.id, current
                )))
            }
        }
        self.lock = Some(holder);
        Ok(())
    }

    /// Release the lock held by `holder`, or any lock when `force` is set.
    pub fn unlock(&mut self, holder: &LockHolder, force: bool) -> Result<(), Error> {
        match &self.lock {
            None => Err(Error::validation(format!(
                "workspace {} already unlocked",
                self.id
            ))),
            Some(_) if force => {
                self.lock = None;
                Ok(())
            }
            Some(current) if current == holder => {
                self.lock = None;
                Ok(())
            }
            Some(current) => Err(Error::validation(format!(
                "workspace {} locked by {}",
                self.id, current
            ))),
        }
    }
}

/// Validate a workspace name: non-empty ASCII alphanumerics, `-`, `_`, `.`.
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::validation("workspace name is required"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::validation(format!(
            "workspace name {:?} contains invalid character {:?}",
            name, bad
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;

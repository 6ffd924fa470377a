// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The set of brokers wired to one store

use crate::broker::{store_getter, Broker};
use rp_core::{Agent, AgentId, Job, Run, Workspace, WorkspaceId};
use rp_storage::{Store, Table};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Brokers {
    pub workspaces: Broker<Workspace>,
    pub runs: Broker<Run>,
    pub jobs: Broker<Job>,
    pub agents: Broker<Agent>,
}

impl Brokers {
    pub fn new<S: Store>(store: &S) -> Self {
        Self {
            workspaces: Broker::new(
                Table::Workspaces,
                store_getter(
                    store.clone(),
                    Some(|id: &str| Workspace::tombstone(WorkspaceId::new(id))),
                ),
            ),
            runs: Broker::new(Table::Runs, store_getter(store.clone(), None)),
            jobs: Broker::new(Table::Jobs, store_getter(store.clone(), None)),
            agents: Broker::new(
                Table::Agents,
                store_getter(
                    store.clone(),
                    Some(|id: &str| Agent::tombstone(AgentId::new(id))),
                ),
            ),
        }
    }

    /// Start one relay task per broker, fed by the store's change feed.
    pub fn spawn<S: Store>(&self, store: &S, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(
                self.workspaces
                    .clone()
                    .relay(store.listen(Table::Workspaces), cancel.clone()),
            ),
            tokio::spawn(
                self.runs
                    .clone()
                    .relay(store.listen(Table::Runs), cancel.clone()),
            ),
            tokio::spawn(
                self.jobs
                    .clone()
                    .relay(store.listen(Table::Jobs), cancel.clone()),
            ),
            tokio::spawn(
                self.agents
                    .clone()
                    .relay(store.listen(Table::Agents), cancel.clone()),
            ),
        ]
    }
}

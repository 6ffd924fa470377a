// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level run scheduler.
//!
//! Keeps one [`RunQueue`] per workspace and routes workspace and run events
//! to it. The queue map is owned by the dispatch loop and never shared.

use crate::broker::Broker;
use rp_core::{Error, Event, Run, Workspace, WorkspaceId};
use rp_storage::Store;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-workspace run serialization.
pub trait RunQueue: Send {
    fn handle_workspace(&mut self, workspace: Workspace) -> Result<(), Error>;
    fn handle_run(&mut self, run: Run) -> Result<(), Error>;
}

pub trait QueueFactory: Send {
    type Queue: RunQueue;

    fn new_queue(&self, workspace: &Workspace) -> Self::Queue;
}

pub struct Scheduler<F: QueueFactory> {
    factory: F,
    queues: HashMap<WorkspaceId, F::Queue>,
}

impl<F: QueueFactory> Scheduler<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            queues: HashMap::new(),
        }
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    pub fn has_queue(&self, workspace_id: &WorkspaceId) -> bool {
        self.queues.contains_key(workspace_id)
    }

    pub fn queue(&self, workspace_id: &WorkspaceId) -> Option<&F::Queue> {
        self.queues.get(workspace_id)
    }

    pub fn handle_workspace_event(&mut self, event: Event<Workspace>) -> Result<(), Error> {
        let workspace = event.payload;
        if event.kind == rp_core::EventType::Deleted {
            if self.queues.remove(&workspace.id).is_some() {
                info!(workspace_id = %workspace.id, "workspace deleted, queue discarded");
            }
            return Ok(());
        }
        let queue = match self.queues.entry(workspace.id.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                debug!(workspace_id = %workspace.id, "creating workspace queue");
                entry.insert(self.factory.new_queue(&workspace))
            }
        };
        queue.handle_workspace(workspace)
    }

    pub fn handle_run_event(&mut self, event: Event<Run>) -> Result<(), Error> {
        let run = event.payload;
        match self.queues.get_mut(&run.workspace_id) {
            Some(queue) => queue.handle_run(run),
            None => {
                debug!(run_id = %run.id, workspace_id = %run.workspace_id, "no queue for run, dropping event");
                Ok(())
            }
        }
    }

    /// Rebuild queue state from a full listing: workspaces first, then every
    /// unfinished or current run in creation order.
    pub fn resync<S: Store>(&mut self, store: &S) -> Result<(), Error> {
        let (workspaces, mut runs) = store.tx(|tx| {
            let workspaces = tx.list::<Workspace>();
            let current: HashSet<_> = workspaces
                .iter()
                .filter_map(|ws| ws.current_run_id.clone())
                .collect();
            let runs = tx.filter::<Run>(|r| !r.is_terminal() || current.contains(&r.id));
            Ok((workspaces, runs))
        })?;

        let live: HashSet<&WorkspaceId> = workspaces.iter().map(|ws| &ws.id).collect();
        self.queues.retain(|id, _| live.contains(id));
        for workspace in workspaces {
            self.dispatch_workspace(Event::updated(workspace));
        }
        runs.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        for run in runs {
            self.dispatch_run(Event::updated(run));
        }
        Ok(())
    }

    fn dispatch_workspace(&mut self, event: Event<Workspace>) {
        let workspace_id = event.payload.id.clone();
        if let Err(e) = self.handle_workspace_event(event) {
            error!(workspace_id = %workspace_id, error = %e, "workspace event failed");
        }
    }

    fn dispatch_run(&mut self, event: Event<Run>) {
        let run_id = event.payload.id.clone();
        if let Err(e) = self.handle_run_event(event) {
            error!(run_id = %run_id, error = %e, "run event failed");
        }
    }

    /// Dispatch loop. A subscription dropped by a broker is replaced and the
    /// gap covered by a resync.
    pub async fn run<S: Store>(
        mut self,
        store: S,
        workspaces: Broker<Workspace>,
        runs: Broker<Run>,
        cancel: CancellationToken,
    ) {
        info!("scheduler started");
        'resubscribe: loop {
            let mut workspace_events = workspaces.subscribe();
            let mut run_events = runs.subscribe();
            if let Err(e) = self.resync(&store) {
                error!(error = %e, "scheduler resync failed");
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'resubscribe,
                    event = workspace_events.recv() => match event {
                        Some(event) => self.dispatch_workspace(event),
                        None => {
                            warn!("workspace subscription dropped, resyncing");
                            continue 'resubscribe;
                        }
                    },
                    event = run_events.recv() => match event {
                        Some(event) => self.dispatch_run(event),
                        None => {
                            warn!("run subscription dropped, resyncing");
                            continue 'resubscribe;
                        }
                    },
                }
            }
        }
        info!("scheduler stopped");
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

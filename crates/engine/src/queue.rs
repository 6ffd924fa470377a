// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace run queue.
//!
//! Runs are promoted to "current" one at a time in arrival order. The
//! current run holds the workspace's run lock and has its active phase
//! materialized as a job through the allocator. Plan-only runs bypass the
//! queue when the workspace has speculative runs enabled.

use crate::allocator::Allocator;
use crate::scheduler::{QueueFactory, RunQueue};
use rp_core::{Clock, Error, LockHolder, Phase, Run, RunId, RunStatus, Workspace};
use rp_storage::Store;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

pub struct WorkspaceQueue<S: Store, C: Clock> {
    workspace: Workspace,
    current: Option<RunId>,
    pending: VecDeque<RunId>,
    allocator: Arc<Allocator<S, C>>,
}

impl<S: Store, C: Clock> WorkspaceQueue<S, C> {
    pub fn new(workspace: Workspace, allocator: Arc<Allocator<S, C>>) -> Self {
        Self {
            workspace,
            current: None,
            pending: VecDeque::new(),
            allocator,
        }
    }

    pub fn current(&self) -> Option<&RunId> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> impl Iterator<Item = &RunId> {
        self.pending.iter()
    }

    fn store(&self) -> &S {
        self.allocator.store()
    }

    /// Create the job for a run's phase. An existing job means the work was
    /// already done by an earlier event.
    fn enqueue(&self, run_id: &RunId, phase: Phase) -> Result<(), Error> {
        match self.allocator.enqueue_phase(run_id, phase) {
            Ok(_) | Err(Error::ResourceAlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Adopt a current run recorded on the workspace, if it is still active.
    fn adopt_recorded_current(&mut self) -> Result<(), Error> {
        let Some(run_id) = self.workspace.current_run_id.clone() else {
            return Ok(());
        };
        let run = self.store().tx(|tx| Ok(tx.find::<Run>(run_id.as_str())))?;
        match run {
            Some(run) if !run.is_terminal() => {
                debug!(workspace_id = %self.workspace.id, run_id = %run_id, "adopting current run");
                self.pending.retain(|id| id != &run_id);
                self.current = Some(run_id);
                Ok(())
            }
            _ => self.release(&run_id),
        }
    }

    /// Clear the run lock and current run if they still belong to `run_id`.
    /// A workspace deleted in the meantime has nothing left to release.
    fn release(&mut self, run_id: &RunId) -> Result<(), Error> {
        let workspace_id = self.workspace.id.clone();
        let workspace = self.store().tx(|tx| {
            if tx.find::<Workspace>(workspace_id.as_str()).is_none() {
                return Ok(None);
            }
            tx.modify::<Workspace>(workspace_id.as_str(), |ws| {
                if ws.lock == Some(LockHolder::Run(run_id.clone())) {
                    ws.lock = None;
                }
                if ws.current_run_id.as_ref() == Some(run_id) {
                    ws.current_run_id = None;
                }
                Ok(())
            })
            .map(Some)
        })?;
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }
        if self.current.as_ref() == Some(run_id) {
            self.current = None;
        }
        Ok(())
    }

    /// Promote pending runs until one is current or the queue is empty.
    fn schedule(&mut self) -> Result<(), Error> {
        while self.current.is_none() {
            if self.workspace.is_user_locked() {
                debug!(workspace_id = %self.workspace.id, "workspace locked by user, holding queue");
                return Ok(());
            }
            let Some(next) = self.pending.pop_front() else {
                return Ok(());
            };
            let run = self.store().tx(|tx| Ok(tx.find::<Run>(next.as_str())))?;
            let Some(run) = run.filter(|r| !r.is_terminal()) else {
                continue;
            };

            // The stored row may carry a user lock this queue has not seen yet
            let promoted = self.store().tx(|tx| {
                let stored = tx.get::<Workspace>(self.workspace.id.as_str())?;
                if stored.is_user_locked() {
                    return Ok((stored, false));
                }
                let ws = tx.modify::<Workspace>(self.workspace.id.as_str(), |ws| {
                    ws.enlock(LockHolder::Run(run.id.clone()))?;
                    ws.current_run_id = Some(run.id.clone());
                    Ok(())
                })?;
                Ok((ws, true))
            });
            let (workspace, locked) = match promoted {
                Ok(promoted) => promoted,
                Err(e) => {
                    self.pending.push_front(next);
                    return Err(e);
                }
            };
            self.workspace = workspace;
            if !locked {
                self.pending.push_front(next);
                debug!(workspace_id = %self.workspace.id, "workspace locked by user, holding queue");
                return Ok(());
            }
            self.current = Some(run.id.clone());
            info!(workspace_id = %self.workspace.id, run_id = %run.id, "run promoted to current");

            if run.status == RunStatus::Pending {
                self.enqueue(&run.id, Phase::Plan)?;
            }
        }
        Ok(())
    }
}

impl<S: Store, C: Clock> RunQueue for WorkspaceQueue<S, C> {
    fn handle_workspace(&mut self, workspace: Workspace) -> Result<(), Error> {
        self.workspace = workspace;
        if self.current.is_none() {
            self.adopt_recorded_current()?;
        }
        self.schedule()
    }

    fn handle_run(&mut self, run: Run) -> Result<(), Error> {
        if run.workspace_id != self.workspace.id {
            return Ok(());
        }

        if run.plan_only && self.workspace.speculative_enabled && self.current.as_ref() != Some(&run.id) {
            if run.status == RunStatus::Pending {
                debug!(run_id = %run.id, "speculative run bypasses queue");
                self.enqueue(&run.id, Phase::Plan)?;
            }
            return Ok(());
        }

        if self.current.as_ref() == Some(&run.id) {
            if run.is_terminal() {
                info!(workspace_id = %self.workspace.id, run_id = %run.id, status = %run.status, "current run finished");
                self.release(&run.id)?;
            } else if run.status == RunStatus::ApplyQueued {
                self.enqueue(&run.id, Phase::Apply)?;
            }
        } else if run.is_terminal() {
            self.pending.retain(|id| id != &run.id);
        } else if !self.pending.contains(&run.id) {
            debug!(workspace_id = %self.workspace.id, run_id = %run.id, "run queued");
            self.pending.push_back(run.id);
        }
        self.schedule()
    }
}

pub struct WorkspaceQueueFactory<S: Store, C: Clock> {
    allocator: Arc<Allocator<S, C>>,
}

impl<S: Store, C: Clock> WorkspaceQueueFactory<S, C> {
    pub fn new(allocator: Arc<Allocator<S, C>>) -> Self {
        Self { allocator }
    }
}

impl<S: Store, C: Clock> QueueFactory for WorkspaceQueueFactory<S, C> {
    type Queue = WorkspaceQueue<S, C>;

    fn new_queue(&self, workspace: &Workspace) -> Self::Queue {
        WorkspaceQueue::new(workspace.clone(), Arc::clone(&self.allocator))
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

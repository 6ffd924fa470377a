// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run submission, confirmation, and cancellation

use crate::allocator::set_signal;
use rp_core::{
    Clock, Error, IdGen, Job, JobSpec, JobStatus, Run, RunId, RunStatus, Signal, Workspace,
    WorkspaceId,
};
use rp_storage::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRunOptions {
    pub workspace_id: WorkspaceId,
    #[serde(default)]
    pub plan_only: bool,
    #[serde(default)]
    pub auto_apply: bool,
}

impl CreateRunOptions {
    pub fn new(workspace_id: impl Into<WorkspaceId>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            plan_only: false,
            auto_apply: false,
        }
    }
}

pub struct Runs<S: Store, C: Clock> {
    store: S,
    clock: C,
    ids: Arc<dyn IdGen>,
}

impl<S: Store, C: Clock> Runs<S, C> {
    pub fn new(store: S, clock: C, ids: Arc<dyn IdGen>) -> Self {
        Self { store, clock, ids }
    }

    /// Create a pending run. The workspace queue picks it up from the change feed.
    pub fn create_run(&self, opts: CreateRunOptions) -> Result<Run, Error> {
        let now = self.clock.epoch_ms();
        let id = RunId::new(self.ids.next("run"));
        let run = self.store.tx(|tx| {
            let workspace = tx.get::<Workspace>(opts.workspace_id.as_str())?;
            let mut run = Run::new(id, workspace.id, workspace.organization, now);
            run.plan_only = opts.plan_only;
            run.auto_apply = opts.auto_apply && !opts.plan_only;
            tx.insert(run.clone())?;
            Ok(run)
        })?;
        info!(run_id = %run.id, workspace_id = %run.workspace_id, plan_only = run.plan_only, "run created");
        Ok(run)
    }

    /// Confirm a planned run so its apply phase is queued.
    pub fn apply_run(&self, run_id: &RunId) -> Result<Run, Error> {
        let run = self.store.tx(|tx| tx.modify::<Run>(run_id.as_str(), |run| run.apply()))?;
        info!(run_id = %run_id, "run confirmed for apply");
        Ok(run)
    }

    pub fn discard_run(&self, run_id: &RunId) -> Result<Run, Error> {
        let run = self.store.tx(|tx| tx.modify::<Run>(run_id.as_str(), |run| run.discard()))?;
        info!(run_id = %run_id, "run discarded");
        Ok(run)
    }

    /// Cancel a run.
    ///
    /// Without a leased job the run is canceled at once, along with its
    /// pending job. With one, the job is signaled and the run finishes when
    /// the agent reports back; `force` marks the run force-canceled without
    /// waiting.
    pub fn cancel_run(&self, run_id: &RunId, force: bool) -> Result<Run, Error> {
        let now = self.clock.epoch_ms();
        let run = self.store.tx(|tx| {
            let mut run = tx.get_for_update::<Run>(run_id.as_str())?;
            if run.is_terminal() {
                return Err(Error::validation(format!(
                    "run {} has already finished ({})",
                    run.id, run.status
                )));
            }
            let active = run
                .status
                .active_phase()
                .and_then(|phase| tx.find::<Job>(&JobSpec::new(run.id.clone(), phase).key()))
                .filter(|job| !job.status.is_terminal());

            match active {
                Some(job) if job.status.is_leased() => {
                    let signal = if force { Signal::ForceCancel } else { Signal::Cancel };
                    set_signal(tx, &job.spec, signal)?;
                    run.cancel_signaled_at_ms = Some(now);
                    if force {
                        run.status = RunStatus::ForceCanceled;
                    }
                }
                Some(job) => {
                    tx.modify::<Job>(&job.key(), |j| {
                        j.finish(JobStatus::Canceled, Some("run canceled".to_string()))
                    })?;
                    run.status = RunStatus::Canceled;
                }
                None => {
                    run.status = if force {
                        RunStatus::ForceCanceled
                    } else {
                        RunStatus::Canceled
                    };
                }
            }
            tx.update(run.clone())?;
            Ok(run)
        })?;
        info!(run_id = %run_id, force, status = %run.status, "run cancel requested");
        Ok(run)
    }

    pub fn get_run(&self, run_id: &RunId) -> Result<Run, Error> {
        self.store.tx(|tx| tx.get::<Run>(run_id.as_str()))
    }

    /// Runs in creation order, optionally for one workspace.
    pub fn list_runs(&self, workspace_id: Option<&WorkspaceId>) -> Result<Vec<Run>, Error> {
        let mut runs = self.store.tx(|tx| {
            Ok(tx.filter::<Run>(|r| workspace_id.is_none_or(|ws| &r.workspace_id == ws)))
        })?;
        runs.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(runs)
    }
}

#[cfg(test)]
#[path = "runs_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs and their phase-driven status machine

use crate::error::Error;
use crate::job::JobStatus;
use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a run.
    pub struct RunId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    Apply,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Apply => "apply",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(Phase::Plan),
            "apply" => Ok(Phase::Apply),
            other => Err(Error::validation(format!("unknown phase {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    PlanQueued,
    Planning,
    Planned,
    PlannedAndFinished,
    ApplyQueued,
    Applying,
    Applied,
    Discarded,
    Errored,
    Canceled,
    ForceCanceled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::PlannedAndFinished
                | RunStatus::Applied
                | RunStatus::Discarded
                | RunStatus::Errored
                | RunStatus::Canceled
                | RunStatus::ForceCanceled
        )
    }

    /// The phase a job should exist for while the run sits in this status.
    pub fn active_phase(&self) -> Option<Phase> {
        match self {
            RunStatus::PlanQueued | RunStatus::Planning => Some(Phase::Plan),
            RunStatus::ApplyQueued | RunStatus::Applying => Some(Phase::Apply),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::PlanQueued => "plan_queued",
            RunStatus::Planning => "planning",
            RunStatus::Planned => "planned",
            RunStatus::PlannedAndFinished => "planned_and_finished",
            RunStatus::ApplyQueued => "apply_queued",
            RunStatus::Applying => "applying",
            RunStatus::Applied => "applied",
            RunStatus::Discarded => "discarded",
            RunStatus::Errored => "errored",
            RunStatus::Canceled => "canceled",
            RunStatus::ForceCanceled => "force_canceled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workspace_id: WorkspaceId,
    pub organization: String,
    /// Speculative run: plans but never applies.
    #[serde(default)]
    pub plan_only: bool,
    /// Queue the apply as soon as the plan succeeds.
    #[serde(default)]
    pub auto_apply: bool,
    pub status: RunStatus,
    #[serde(default)]
    pub cancel_signaled_at_ms: Option<u64>,
    pub created_at_ms: u64,
}

impl Run {
    pub fn new(
        id: RunId,
        workspace_id: WorkspaceId,
        organization: impl Into<String>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            workspace_id,
            organization: organization.into(),
            plan_only: false,
            auto_apply: false,
            status: RunStatus::Pending,
            cancel_signaled_at_ms: None,
            created_at_ms,
        }
    }

    pub fn phases(&self) -> &'static [Phase] {
        if self.plan_only {
            &[Phase::Plan]
        } else {
            &[Phase::Plan, Phase::Apply]
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move a run into the queued status for `phase`. Repeating the
    /// transition is accepted so job creation stays idempotent.
    pub fn enqueue_phase(&mut self, phase: Phase) -> Result<(), Error> {
        let next = match (phase, self.status) {
            (Phase::Plan, RunStatus::Pending | RunStatus::PlanQueued) => RunStatus::PlanQueued,
            (Phase::Apply, RunStatus::ApplyQueued) if !self.plan_only => RunStatus::ApplyQueued,
            _ => return Err(self.invalid(&format!("enqueue {}", phase))),
        };
        self.status = next;
        Ok(())
    }

    pub fn start_phase(&mut self, phase: Phase) -> Result<(), Error> {
        self.status = match (phase, self.status) {
            (Phase::Plan, RunStatus::PlanQueued) => RunStatus::Planning,
            (Phase::Apply, RunStatus::ApplyQueued) => RunStatus::Applying,
            _ => return Err(self.invalid(&format!("start {}", phase))),
        };
        Ok(())
    }

    /// Record the outcome of a phase's job. Returns `false` when the run was
    /// already terminal and nothing changed.
    pub fn finish_phase(&mut self, phase: Phase, outcome: JobStatus) -> Result<bool, Error> {
        if self.is_terminal() {
            return Ok(false);
        }
        if self.status.active_phase() != Some(phase) {
            return Err(self.invalid(&format!("finish {}", phase)));
        }
        self.status = match (phase, outcome) {
            (_, JobStatus::Errored) => RunStatus::Errored,
            (_, JobStatus::Canceled) => RunStatus::Canceled,
            (Phase::Plan, JobStatus::Finished) if self.plan_only => RunStatus::PlannedAndFinished,
            (Phase::Plan, JobStatus::Finished) if self.auto_apply => RunStatus::ApplyQueued,
            (Phase::Plan, JobStatus::Finished) => RunStatus::Planned,
            (Phase::Apply, JobStatus::Finished) => RunStatus::Applied,
            (_, other) => {
                return Err(Error::validation(format!(
                    "{} is not a finishing job status",
                    other
                )))
            }
        };
        Ok(true)
    }

    /// Confirm a planned run.
    pub fn apply(&mut self) -> Result<(), Error> {
        if self.status != RunStatus::Planned {
            return Err(self.invalid("apply"));
        }
        self.status = RunStatus::ApplyQueued;
        Ok(())
    }

    pub fn discard(&mut self) -> Result<(), Error> {
        if self.status != RunStatus::Planned {
            return Err(self.invalid("discard"));
        }
        self.status = RunStatus::Discarded;
        Ok(())
    }

    fn invalid(&self, action: &str) -> Error {
        Error::validation(format!(
            "cannot {} run {} with status {}",
            action, self.id, self.status
        ))
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake executor for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rp_core::{JobSpec, Phase};
use rp_engine::StartedJob;
use tokio_util::sync::CancellationToken;

use super::{ExecuteError, PhaseExecutor};

/// How a fake phase ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOutcome {
    Succeed,
    Fail(String),
    /// Runs until canceled.
    Hang,
}

#[derive(Default)]
struct FakeState {
    outcomes: HashMap<Phase, FakeOutcome>,
    started: Vec<JobSpec>,
    canceled: Vec<JobSpec>,
    tokens: Vec<String>,
}

/// Records every execution. Phases succeed unless told otherwise.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, phase: Phase, outcome: FakeOutcome) {
        self.inner.lock().outcomes.insert(phase, outcome);
    }

    pub fn started(&self) -> Vec<JobSpec> {
        self.inner.lock().started.clone()
    }

    pub fn canceled(&self) -> Vec<JobSpec> {
        self.inner.lock().canceled.clone()
    }

    /// Job tokens handed to executions, in start order.
    pub fn tokens(&self) -> Vec<String> {
        self.inner.lock().tokens.clone()
    }
}

#[async_trait]
impl PhaseExecutor for FakeExecutor {
    async fn execute(&self, job: &StartedJob, cancel: CancellationToken) -> Result<(), ExecuteError> {
        let spec = job.job.spec.clone();
        let outcome = {
            let mut state = self.inner.lock();
            state.started.push(spec.clone());
            state.tokens.push(job.token.clone());
            state
                .outcomes
                .get(&spec.phase)
                .cloned()
                .unwrap_or(FakeOutcome::Succeed)
        };
        match outcome {
            FakeOutcome::Succeed => Ok(()),
            FakeOutcome::Fail(message) => Err(ExecuteError::Failed(message)),
            FakeOutcome::Hang => {
                cancel.cancelled().await;
                self.inner.lock().canceled.push(spec);
                Err(ExecuteError::Canceled)
            }
        }
    }
}

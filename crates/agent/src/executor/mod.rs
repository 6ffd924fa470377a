// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase executors: what an agent does with a started job

mod command;

pub use command::CommandExecutor;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeExecutor, FakeOutcome};

use async_trait::async_trait;
use rp_core::JobStatus;
use rp_engine::StartedJob;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from phase execution
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Stopped because `cancel` fired.
    #[error("canceled")]
    Canceled,
    #[error("{0}")]
    Failed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecuteError {
    /// The job outcome reported for this error.
    pub fn job_status(&self) -> JobStatus {
        match self {
            ExecuteError::Canceled => JobStatus::Canceled,
            ExecuteError::Failed(_) | ExecuteError::Io(_) => JobStatus::Errored,
        }
    }
}

/// Runs one phase of one run to completion.
///
/// Implementations must return promptly with [`ExecuteError::Canceled`]
/// once `cancel` fires.
#[async_trait]
pub trait PhaseExecutor: Send + Sync + 'static {
    async fn execute(&self, job: &StartedJob, cancel: CancellationToken) -> Result<(), ExecuteError>;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs a configured program once per phase

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rp_engine::StartedJob;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ExecuteError, PhaseExecutor};

/// Spawns `program <phase>` in a per-job directory under `work_dir`.
///
/// The child sees `RP_RUN_ID`, `RP_PHASE`, `RP_WORKSPACE_ID`,
/// `RP_ORGANIZATION` and `RP_JOB_TOKEN`; its output goes to `output.log`
/// in the job directory. Cancellation kills it.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: PathBuf,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Arguments placed before the phase name.
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn job_dir(&self, job: &StartedJob) -> PathBuf {
        self.work_dir
            .join(format!("{}-{}", job.job.spec.run_id, job.job.spec.phase))
    }

    fn command(&self, job: &StartedJob, dir: &Path) -> Result<Command, ExecuteError> {
        let log = std::fs::File::create(dir.join("output.log"))?;
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(job.job.spec.phase.as_str())
            .current_dir(dir)
            .env("RP_RUN_ID", job.run.id.as_str())
            .env("RP_PHASE", job.job.spec.phase.as_str())
            .env("RP_WORKSPACE_ID", job.workspace.id.as_str())
            .env("RP_ORGANIZATION", &job.workspace.organization)
            .env("RP_JOB_TOKEN", &job.token)
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log)
            .kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl PhaseExecutor for CommandExecutor {
    async fn execute(&self, job: &StartedJob, cancel: CancellationToken) -> Result<(), ExecuteError> {
        let spec = &job.job.spec;
        let dir = self.job_dir(job);
        tokio::fs::create_dir_all(&dir).await?;

        let mut child = self.command(job, &dir)?.spawn().map_err(|e| {
            ExecuteError::Failed(format!("failed to spawn {}: {}", self.program.display(), e))
        })?;
        debug!(job = %spec, program = %self.program.display(), dir = %dir.display(), "phase spawned");

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    info!(job = %spec, "phase succeeded");
                    Ok(())
                } else {
                    warn!(job = %spec, %status, "phase failed");
                    Err(ExecuteError::Failed(format!("{} exited with {}", spec.phase, status)))
                }
            }
            _ = cancel.cancelled() => {
                info!(job = %spec, "canceling phase");
                if let Err(e) = child.kill().await {
                    warn!(job = %spec, error = %e, "failed to kill phase process");
                }
                Err(ExecuteError::Canceled)
            }
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;

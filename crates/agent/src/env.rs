// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the agent.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::daemon::AgentConfig;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Everything the `rp-agent` binary needs, resolved from `RP_*` variables.
#[derive(Debug, Clone)]
pub struct AgentEnv {
    pub address: String,
    pub token: String,
    pub executor: PathBuf,
    pub work_dir: PathBuf,
    pub ipc_timeout: Duration,
    pub config: AgentConfig,
}

impl AgentEnv {
    pub fn load() -> Result<Self, EnvError> {
        Self::resolve(&|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    pub fn resolve(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, EnvError> {
        let required = |name: &'static str| lookup(name).ok_or(EnvError::Missing(name));
        let number = |name: &'static str| -> Result<Option<u64>, EnvError> {
            lookup(name)
                .map(|raw| {
                    raw.parse::<u64>().map_err(|e| EnvError::Invalid {
                        name,
                        message: e.to_string(),
                    })
                })
                .transpose()
        };

        let name = lookup("RP_AGENT_NAME")
            .or_else(|| lookup("HOSTNAME"))
            .unwrap_or_else(|| "rp-agent".to_string());
        let mut config = AgentConfig::new(name);
        if let Some(max_jobs) = number("RP_AGENT_MAX_JOBS")? {
            config.max_jobs = u32::try_from(max_jobs).map_err(|e| EnvError::Invalid {
                name: "RP_AGENT_MAX_JOBS",
                message: e.to_string(),
            })?;
        }
        if let Some(ms) = number("RP_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(Self {
            address: lookup("RP_ADDRESS").unwrap_or_else(|| "127.0.0.1:7410".to_string()),
            token: required("RP_AGENT_TOKEN")?,
            executor: required("RP_EXECUTOR")?.into(),
            work_dir: lookup("RP_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("rp-agent")),
            ipc_timeout: number("RP_TIMEOUT_IPC_MS")?
                .map(Duration::from_millis)
                .unwrap_or(Duration::from_secs(5)),
            config,
        })
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

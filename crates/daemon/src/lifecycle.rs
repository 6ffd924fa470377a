// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: configuration, startup, shutdown.

use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use rp_core::{IdGen, SystemClock, UuidIdGen};
use rp_engine::{Allocator, Brokers, ReaperConfig, Runs, Workspaces};
use rp_storage::{MemStore, Snapshot};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::env;

pub type DaemonAllocator = Allocator<MemStore, SystemClock>;
pub type DaemonRuns = Runs<MemStore, SystemClock>;
pub type DaemonWorkspaces = Workspaces<MemStore, SystemClock>;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:7410";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/rp)
    pub state_dir: PathBuf,
    /// TCP address agents and admin clients connect to
    pub listen: SocketAddr,
    /// Bearer token for admin requests; admin access is open when unset
    pub admin_token: Option<String>,
    /// How often the reaper and a full allocation pass run
    pub sweep_interval: Duration,
    /// How often the store is snapshotted (when it changed)
    pub checkpoint_interval: Duration,
    pub reaper: ReaperConfig,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to snapshot file
    pub snapshot_path: PathBuf,
}

/// Optional TOML overlay, read from `RP_CONFIG`. Environment variables win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub state_dir: Option<PathBuf>,
    pub listen: Option<String>,
    pub admin_token: Option<String>,
    pub sweep_interval_ms: Option<u64>,
    pub checkpoint_interval_ms: Option<u64>,
    pub agent_unknown_after_ms: Option<u64>,
    pub job_lease_timeout_ms: Option<u64>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, LifecycleError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| LifecycleError::Config(format!("{}: {}", path.display(), e)))
    }
}

impl Config {
    /// Load configuration from the process environment and `RP_CONFIG`.
    pub fn load() -> Result<Self, LifecycleError> {
        let file = match env::var(env::CONFIG) {
            Some(path) => FileConfig::read(Path::new(&path))?,
            None => FileConfig::default(),
        };
        Self::resolve(file, &env::var)
    }

    /// Merge a file overlay with an environment lookup.
    pub fn resolve(
        file: FileConfig,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, LifecycleError> {
        let state_dir = match lookup(env::STATE_DIR).map(PathBuf::from).or(file.state_dir) {
            Some(dir) => dir,
            None => env::default_state_dir(lookup).ok_or(LifecycleError::NoStateDir)?,
        };

        let listen = lookup(env::LISTEN)
            .or(file.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = listen
            .parse::<SocketAddr>()
            .map_err(|e| LifecycleError::Config(format!("{}: {}", env::LISTEN, e)))?;

        let millis = |name: &str, fallback: Option<u64>| -> Result<Option<Duration>, LifecycleError> {
            match lookup(name) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map(|ms| Some(Duration::from_millis(ms)))
                    .map_err(|e| LifecycleError::Config(format!("{}: {}", name, e))),
                None => Ok(fallback.map(Duration::from_millis)),
            }
        };

        let defaults = ReaperConfig::default();
        let reaper = ReaperConfig {
            agent_unknown_after: millis(env::AGENT_UNKNOWN_AFTER_MS, file.agent_unknown_after_ms)?
                .unwrap_or(defaults.agent_unknown_after),
            job_lease_timeout: millis(env::JOB_LEASE_TIMEOUT_MS, file.job_lease_timeout_ms)?
                .unwrap_or(defaults.job_lease_timeout),
        };

        let mut config = Self::for_state_dir(state_dir);
        config.listen = listen;
        config.admin_token = lookup(env::ADMIN_TOKEN).or(file.admin_token);
        config.sweep_interval = millis(env::SWEEP_INTERVAL_MS, file.sweep_interval_ms)?
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);
        config.checkpoint_interval = millis(env::CHECKPOINT_INTERVAL_MS, file.checkpoint_interval_ms)?
            .unwrap_or(DEFAULT_CHECKPOINT_INTERVAL);
        config.reaper = reaper;
        Ok(config)
    }

    /// Defaults rooted at `state_dir`, listening on an ephemeral localhost port.
    pub fn for_state_dir(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            admin_token: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            reaper: ReaperConfig::default(),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            snapshot_path: state_dir.join("snapshot.json"),
            state_dir,
        }
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub store: MemStore,
    pub allocator: Arc<DaemonAllocator>,
    pub runs: Arc<DaemonRuns>,
    pub workspaces: Arc<DaemonWorkspaces>,
    pub brokers: Brokers,
    /// When daemon started
    pub start_time: Instant,
}

/// Result of daemon startup: the daemon state and its bound listener.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: TcpListener,
}

impl StartupResult {
    pub fn local_addr(&self) -> Result<SocketAddr, LifecycleError> {
        Ok(self.listener.local_addr()?)
    }
}

impl DaemonState {
    /// Save a final snapshot and release the PID file.
    pub fn shutdown(&self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        match self.store.snapshot().save(&self.config.snapshot_path) {
            Ok(size_bytes) => info!(
                version = self.store.version(),
                size_bytes,
                "saved final shutdown snapshot"
            ),
            Err(e) => warn!("Failed to save shutdown snapshot: {}", e),
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] rp_storage::SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon: take the lock, recover the store, bind the listener.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Open without truncating so a running daemon's PID survives a failed lock.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    let store = match Snapshot::load(&config.snapshot_path)? {
        Some(snapshot) => {
            info!(
                version = snapshot.version,
                workspaces = snapshot.tables.workspaces.len(),
                runs = snapshot.tables.runs.len(),
                jobs = snapshot.tables.jobs.len(),
                agents = snapshot.tables.agents.len(),
                "loaded snapshot"
            );
            MemStore::from_snapshot(snapshot)
        }
        None => {
            info!("No snapshot found, starting with empty state");
            MemStore::new()
        }
    };

    let ids: Arc<dyn IdGen> = Arc::new(UuidIdGen);
    let allocator = Arc::new(Allocator::with_id_gen(
        store.clone(),
        SystemClock,
        Arc::clone(&ids),
    ));
    let runs = Arc::new(Runs::new(store.clone(), SystemClock, Arc::clone(&ids)));
    let workspaces = Arc::new(Workspaces::new(store.clone(), SystemClock, ids));
    let brokers = Brokers::new(&store);

    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.listen, e))?;

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            store,
            allocator,
            runs,
            workspaces,
            brokers,
            start_time: Instant::now(),
        },
        listener,
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

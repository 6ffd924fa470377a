// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background tasks: sweep, checkpoint, and the job/agent event log

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rp_core::{Agent, Event, Job};
use rp_engine::{Broker, ReaperConfig};
use rp_storage::MemStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lifecycle::DaemonAllocator;

/// Reap silent agents, then place whatever is pending, every `interval`.
pub(crate) fn spawn_sweep(
    allocator: Arc<DaemonAllocator>,
    reaper: ReaperConfig,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match allocator.reap(&reaper) {
                Ok(report) if !report.is_empty() => debug!(?report, "sweep reaped"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reaper failed"),
            }
            match allocator.allocate_pending() {
                Ok(allocated) if !allocated.is_empty() => {
                    debug!(count = allocated.len(), "sweep allocated jobs")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "allocation sweep failed"),
            }
        }
    })
}

/// Save a snapshot every `interval` when the store has changed since the last one.
pub(crate) fn spawn_checkpoint(
    store: MemStore,
    snapshot_path: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut saved_version = store.version();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let version = store.version();
            if version == saved_version {
                continue;
            }
            match store.snapshot().save(&snapshot_path) {
                Ok(size_bytes) => {
                    debug!(version, size_bytes, "saved checkpoint snapshot");
                    saved_version = version;
                }
                Err(e) => warn!(error = %e, "failed to save checkpoint snapshot"),
            }
        }
    })
}

/// Log every job and agent change. A subscription dropped on overflow is replaced.
pub(crate) fn spawn_event_log(
    jobs: Broker<Job>,
    agents: Broker<Agent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        'resubscribe: loop {
            let mut job_events = jobs.subscribe();
            let mut agent_events = agents.subscribe();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'resubscribe,
                    event = job_events.recv() => match event {
                        Some(event) => log_job(&event),
                        None => {
                            warn!("job event log fell behind, resubscribing");
                            continue 'resubscribe;
                        }
                    },
                    event = agent_events.recv() => match event {
                        Some(event) => log_agent(&event),
                        None => {
                            warn!("agent event log fell behind, resubscribing");
                            continue 'resubscribe;
                        }
                    },
                }
            }
        }
    })
}

fn log_job(event: &Event<Job>) {
    let job = &event.payload;
    info!(
        event = %event.kind,
        job = %job.spec,
        status = %job.status,
        workspace_id = %job.workspace_id,
        agent_id = job.agent_id.as_ref().map(|a| a.as_str()).unwrap_or(""),
        "job event",
    );
}

fn log_agent(event: &Event<Agent>) {
    let agent = &event.payload;
    info!(
        event = %event.kind,
        agent_id = %agent.id,
        status = %agent.status,
        current_jobs = agent.current_jobs,
        "agent event",
    );
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run control plane daemon library
//!
//! Exposes the wire protocol for agents and admin clients, and the
//! startup/serve entry points used by `rpd` and end-to-end tests.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod env;
pub mod lifecycle;
mod listener;
pub mod protocol;
mod tasks;

pub use client::DaemonClient;
pub use lifecycle::{startup, Config, DaemonState, FileConfig, LifecycleError, StartupResult};
pub use protocol::{
    AdminOp, AgentOp, ProtocolError, Request, Response, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE,
    PROTOCOL_VERSION,
};

use rp_engine::{Scheduler, WorkspaceQueueFactory};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::listener::{ListenCtx, Listener};

/// Run every background task and the listener until `cancel` fires (or an
/// admin shutdown request arrives), then save a final snapshot.
pub async fn serve(started: StartupResult, cancel: CancellationToken) -> Result<(), LifecycleError> {
    let StartupResult { daemon, listener } = started;
    let config = &daemon.config;

    if config.admin_token.is_none() {
        warn!("no admin token configured, admin requests are unauthenticated");
    }

    let tasks = cancel.child_token();
    let mut handles = daemon.brokers.spawn(&daemon.store, &tasks);

    let scheduler = Scheduler::new(WorkspaceQueueFactory::new(daemon.allocator.clone()));
    handles.push(tokio::spawn(scheduler.run(
        daemon.store.clone(),
        daemon.brokers.workspaces.clone(),
        daemon.brokers.runs.clone(),
        tasks.clone(),
    )));
    handles.push(tasks::spawn_sweep(
        daemon.allocator.clone(),
        config.reaper.clone(),
        config.sweep_interval,
        tasks.clone(),
    ));
    handles.push(tasks::spawn_checkpoint(
        daemon.store.clone(),
        config.snapshot_path.clone(),
        config.checkpoint_interval,
        tasks.clone(),
    ));
    handles.push(tasks::spawn_event_log(
        daemon.brokers.jobs.clone(),
        daemon.brokers.agents.clone(),
        tasks.clone(),
    ));

    let listener = Listener::new(listener, ListenCtx::new(&daemon, tasks.clone()));
    handles.push(tokio::spawn(listener.run(tasks.clone())));

    info!(listen = %config.listen, "daemon ready");
    tasks.cancelled().await;
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }

    daemon.shutdown()
}

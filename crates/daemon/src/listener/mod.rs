// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling TCP I/O.
//!
//! One task per connection, one request per connection. Engine calls are
//! short synchronous transactions and run inline on the connection task.

mod admin;
mod agents;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use rp_core::{Error, JobStatus, Run, Workspace};
use rp_storage::Store;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::lifecycle::{DaemonAllocator, DaemonRuns, DaemonState, DaemonWorkspaces};
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Handles shared by every connection.
pub(crate) struct ListenCtx {
    pub allocator: Arc<DaemonAllocator>,
    pub runs: Arc<DaemonRuns>,
    pub workspaces: Arc<DaemonWorkspaces>,
    pub admin_token: Option<String>,
    pub start_time: Instant,
    /// Cancelled by an admin shutdown request
    pub shutdown: CancellationToken,
}

impl ListenCtx {
    pub fn new(daemon: &DaemonState, shutdown: CancellationToken) -> Self {
        Self {
            allocator: Arc::clone(&daemon.allocator),
            runs: Arc::clone(&daemon.runs),
            workspaces: Arc::clone(&daemon.workspaces),
            admin_token: daemon.config.admin_token.clone(),
            start_time: daemon.start_time,
            shutdown,
        }
    }
}

/// Listener task for accepting TCP connections.
pub(crate) struct Listener {
    socket: TcpListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl Listener {
    pub fn new(socket: TcpListener, ctx: ListenCtx) -> Self {
        Self {
            socket,
            ctx: Arc::new(ctx),
        }
    }

    /// Run the listener loop until cancelled, spawning tasks for each connection.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.socket.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!(%peer, "Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!(%peer, "Connection timeout")
                                }
                                _ => error!(%peer, "Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
        debug!("listener stopped");
    }
}

/// Handle a single client connection.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Agents poll constantly; keep their traffic at debug
    if request.is_frequent() {
        debug!(%peer, request = request.label(), "received request");
    } else {
        info!(%peer, request = request.label(), "received request");
    }

    let response = handle_request(request, peer.ip(), ctx);
    if let Response::Error { kind, message } = &response {
        debug!(%peer, ?kind, message, "request failed");
    }

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

/// Map one request to its response. Engine errors become `Response::Error`.
pub(crate) fn handle_request(request: Request, peer_ip: IpAddr, ctx: &ListenCtx) -> Response {
    let result = match request {
        Request::Ping => Ok(Response::Pong),
        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                warn!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Ok(Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            })
        }
        Request::Status => status(ctx),
        Request::Agent { token, op } => agents::handle(ctx, &token, op, peer_ip),
        Request::JobInfo { token } => agents::job_info(ctx, &token),
        Request::Admin { token, op } => {
            authorize_admin(ctx, token.as_deref()).and_then(|()| admin::handle(ctx, op))
        }
    };
    result.unwrap_or_else(|e| Response::error(&e))
}

fn authorize_admin(ctx: &ListenCtx, token: Option<&str>) -> Result<(), Error> {
    match &ctx.admin_token {
        Some(expected) if token != Some(expected.as_str()) => Err(Error::AccessNotPermitted),
        _ => Ok(()),
    }
}

fn status(ctx: &ListenCtx) -> Result<Response, Error> {
    let store = ctx.allocator.store();
    let (workspaces, active_runs) = store.tx(|tx| {
        Ok((
            tx.list::<Workspace>().len(),
            tx.filter::<Run>(|r| !r.is_terminal()).len(),
        ))
    })?;
    let jobs = ctx.allocator.list_jobs()?;
    let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
    Ok(Response::Status {
        version: PROTOCOL_VERSION.to_string(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        workspaces,
        active_runs,
        pending_jobs: count(JobStatus::Pending),
        running_jobs: count(JobStatus::Running),
        agents: ctx.allocator.list_agents(None)?.len(),
    })
}

#[cfg(test)]
#[path = "../listener_tests/mod.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener tests: request handling against a real daemon state.

mod admin;
mod agents;
mod tcp;

use super::*;
use crate::lifecycle::{startup, Config, StartupResult};
use crate::protocol::{AdminOp, AgentOp};
use rp_core::{AgentPool, Workspace};
use rp_engine::{CreatePoolOptions, CreateWorkspaceOptions};
use tempfile::TempDir;

const ADMIN: &str = "admin-secret";
const PEER: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 7));

struct Fixture {
    _dir: TempDir,
    started: StartupResult,
    ctx: ListenCtx,
}

impl Fixture {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::for_state_dir(dir.path());
        config.admin_token = Some(ADMIN.to_string());
        let started = startup(&config).await.unwrap();
        let ctx = ListenCtx::new(&started.daemon, CancellationToken::new());
        Self {
            _dir: dir,
            started,
            ctx,
        }
    }

    fn send(&self, request: Request) -> Response {
        handle_request(request, PEER, &self.ctx)
    }

    fn admin(&self, op: AdminOp) -> Response {
        self.send(Request::Admin {
            token: Some(ADMIN.to_string()),
            op,
        })
    }

    fn agent(&self, token: &str, op: AgentOp) -> Response {
        self.send(Request::Agent {
            token: token.to_string(),
            op,
        })
    }

    fn pool(&self) -> AgentPool {
        match self.admin(AdminOp::CreatePool {
            options: CreatePoolOptions {
                name: "runners".to_string(),
                organization: "acme".to_string(),
                organization_scoped: true,
                allowed_workspaces: Vec::new(),
            },
        }) {
            Response::Pool { pool } => pool,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    /// Create a token for `pool`, returning its secret.
    fn token(&self, pool: &AgentPool) -> String {
        match self.admin(AdminOp::CreateAgentToken {
            pool_id: pool.id.clone(),
            description: "ci".to_string(),
        }) {
            Response::Token {
                secret: Some(secret),
                ..
            } => secret,
            other => panic!("unexpected response: {other:?}"),
        }
    }

    fn workspace(&self, name: &str) -> Workspace {
        match self.admin(AdminOp::CreateWorkspace {
            options: CreateWorkspaceOptions {
                name: name.to_string(),
                organization: "acme".to_string(),
                ..Default::default()
            },
        }) {
            Response::Workspace { workspace } => workspace,
            other => panic!("unexpected response: {other:?}"),
        }
    }
}

fn error_kind(response: &Response) -> Option<rp_core::ErrorKind> {
    match response {
        Response::Error { kind, .. } => Some(*kind),
        _ => None,
    }
}

#[tokio::test]
async fn ping_and_hello() {
    let f = Fixture::new().await;
    assert_eq!(f.send(Request::Ping), Response::Pong);
    assert_eq!(
        f.send(Request::Hello {
            version: "0.0.0".to_string()
        }),
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn status_counts_state() {
    let f = Fixture::new().await;
    f.workspace("network");
    f.workspace("storage");

    match f.send(Request::Status) {
        Response::Status {
            version,
            workspaces,
            active_runs,
            pending_jobs,
            agents,
            ..
        } => {
            assert_eq!(version, PROTOCOL_VERSION);
            assert_eq!(workspaces, 2);
            assert_eq!(active_runs, 0);
            assert_eq!(pending_jobs, 0);
            assert_eq!(agents, 0);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

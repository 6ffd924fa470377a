// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A full run driven over TCP: admin requests in, a remote agent polling.

use std::time::Duration;

use crate::prelude::*;
use rp_agent::{AgentConfig, AgentDaemon, FakeExecutor, RemoteClient};
use rp_core::test_support::TEST_ORG;
use rp_core::{Phase, Run, RunStatus};
use rp_daemon::{AdminOp, Config, DaemonClient, Request, Response};
use rp_engine::{CreatePoolOptions, CreateRunOptions, CreateWorkspaceOptions};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn admin(client: &DaemonClient, op: AdminOp) -> Response {
    let response = client
        .send(&Request::Admin { token: None, op })
        .await
        .unwrap();
    if let Response::Error { kind, message } = &response {
        panic!("admin request failed: {kind:?}: {message}");
    }
    response
}

async fn get_run(client: &DaemonClient, run: &Run) -> Run {
    match admin(client, AdminOp::GetRun { id: run.id.clone() }).await {
        Response::Run { run } => run,
        other => panic!("unexpected response: {other:?}"),
    }
}

async fn wait_run(client: &DaemonClient, run: &Run, status: RunStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    loop {
        let current = get_run(client, run).await;
        if current.status == status {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "run {} never reached {status}: {current:?}",
            run.id
        );
        tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
}

#[tokio::test]
async fn plan_and_apply_over_the_wire() {
    let dir = TempDir::new().unwrap();
    let started = rp_daemon::startup(&Config::for_state_dir(dir.path()))
        .await
        .unwrap();
    let addr = started.local_addr().unwrap().to_string();
    let cancel = CancellationToken::new();
    let server = tokio::spawn(rp_daemon::serve(started, cancel.clone()));
    let client = DaemonClient::new(addr.clone());

    let Response::Pool { pool } = admin(
        &client,
        AdminOp::CreatePool {
            options: CreatePoolOptions {
                name: "runners".to_string(),
                organization: TEST_ORG.to_string(),
                organization_scoped: true,
                allowed_workspaces: Vec::new(),
            },
        },
    )
    .await
    else {
        panic!("expected a pool");
    };
    let Response::Token {
        secret: Some(secret),
        ..
    } = admin(
        &client,
        AdminOp::CreateAgentToken {
            pool_id: pool.id.clone(),
            description: "ci".to_string(),
        },
    )
    .await
    else {
        panic!("expected a token with its secret");
    };
    let Response::Workspace { workspace } = admin(
        &client,
        AdminOp::CreateWorkspace {
            options: CreateWorkspaceOptions {
                name: "network".to_string(),
                organization: TEST_ORG.to_string(),
                ..Default::default()
            },
        },
    )
    .await
    else {
        panic!("expected a workspace");
    };

    let executor = FakeExecutor::new();
    let remote = RemoteClient::new(addr.clone(), secret, Duration::from_secs(5));
    let mut config = AgentConfig::new("remote-1");
    config.poll_interval = AGENT_POLL;
    let agent_cancel = cancel.child_token();
    let agent = tokio::spawn(AgentDaemon::new(remote, executor.clone(), config).run(agent_cancel.clone()));

    let Response::Run { run } = admin(
        &client,
        AdminOp::CreateRun {
            options: CreateRunOptions::new(workspace.id.clone()),
        },
    )
    .await
    else {
        panic!("expected a run");
    };

    wait_run(&client, &run, RunStatus::Planned).await;
    admin(&client, AdminOp::ApplyRun { id: run.id.clone() }).await;
    wait_run(&client, &run, RunStatus::Applied).await;

    let phases: Vec<Phase> = executor.started().into_iter().map(|spec| spec.phase).collect();
    assert_eq!(phases, vec![Phase::Plan, Phase::Apply]);

    match client.send(&Request::Status).await.unwrap() {
        Response::Status {
            workspaces,
            active_runs,
            pending_jobs,
            running_jobs,
            agents,
            ..
        } => {
            assert_eq!(workspaces, 1);
            assert_eq!(active_runs, 0);
            assert_eq!(pending_jobs, 0);
            assert_eq!(running_jobs, 0);
            assert_eq!(agents, 1);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    agent_cancel.cancel();
    agent.await.unwrap().unwrap();
    cancel.cancel();
    server.await.unwrap().unwrap();
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rp_core::{ErrorKind, RunStatus};
use rp_engine::CreateRunOptions;

#[tokio::test]
async fn admin_requires_the_configured_token() {
    let f = Fixture::new().await;
    let missing = f.send(Request::Admin {
        token: None,
        op: AdminOp::ListJobs,
    });
    assert_eq!(error_kind(&missing), Some(ErrorKind::AccessNotPermitted));

    let wrong = f.send(Request::Admin {
        token: Some("guess".to_string()),
        op: AdminOp::ListJobs,
    });
    assert_eq!(error_kind(&wrong), Some(ErrorKind::AccessNotPermitted));

    assert_eq!(
        f.admin(AdminOp::ListJobs),
        Response::Jobs { jobs: Vec::new() }
    );
}

#[tokio::test]
async fn admin_is_open_without_a_token() {
    let mut f = Fixture::new().await;
    f.ctx.admin_token = None;
    let response = f.send(Request::Admin {
        token: None,
        op: AdminOp::ListWorkspaces { organization: None },
    });
    assert_eq!(
        response,
        Response::Workspaces {
            workspaces: Vec::new()
        }
    );
}

#[tokio::test]
async fn workspace_lifecycle() {
    let f = Fixture::new().await;
    let ws = f.workspace("network");

    let duplicate = f.admin(AdminOp::CreateWorkspace {
        options: CreateWorkspaceOptions {
            name: "network".to_string(),
            organization: "acme".to_string(),
            ..Default::default()
        },
    });
    assert_eq!(error_kind(&duplicate), Some(ErrorKind::ResourceAlreadyExists));

    match f.admin(AdminOp::LockWorkspace {
        id: ws.id.clone(),
        user: "alice".to_string(),
    }) {
        Response::Workspace { workspace } => assert!(workspace.lock.is_some()),
        other => panic!("unexpected response: {other:?}"),
    }
    match f.admin(AdminOp::UnlockWorkspace {
        id: ws.id.clone(),
        user: "alice".to_string(),
        force: false,
    }) {
        Response::Workspace { workspace } => assert!(workspace.lock.is_none()),
        other => panic!("unexpected response: {other:?}"),
    }

    assert!(matches!(
        f.admin(AdminOp::DeleteWorkspace { id: ws.id.clone() }),
        Response::Workspace { .. }
    ));
    let gone = f.admin(AdminOp::GetWorkspace { id: ws.id });
    assert_eq!(error_kind(&gone), Some(ErrorKind::ResourceNotFound));
}

#[tokio::test]
async fn run_requests_reach_the_run_service() {
    let f = Fixture::new().await;
    let ws = f.workspace("network");

    let run = match f.admin(AdminOp::CreateRun {
        options: CreateRunOptions::new(ws.id.clone()),
    }) {
        Response::Run { run } => run,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(run.status, RunStatus::Pending);

    match f.admin(AdminOp::ListRuns {
        workspace_id: Some(ws.id.clone()),
    }) {
        Response::Runs { runs } => assert_eq!(runs, vec![run.clone()]),
        other => panic!("unexpected response: {other:?}"),
    }

    // Nothing to apply before a plan exists
    let early = f.admin(AdminOp::ApplyRun { id: run.id.clone() });
    assert!(error_kind(&early).is_some());

    match f.admin(AdminOp::CancelRun {
        id: run.id.clone(),
        force: false,
    }) {
        Response::Run { run } => assert_eq!(run.status, RunStatus::Canceled),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn pool_tokens_are_listed_without_secrets() {
    let f = Fixture::new().await;
    let pool = f.pool();
    let secret = f.token(&pool);

    match f.admin(AdminOp::ListAgentTokens {
        pool_id: pool.id.clone(),
    }) {
        Response::Tokens { tokens } => {
            assert_eq!(tokens.len(), 1);
            let json = serde_json::to_string(&tokens).unwrap();
            assert!(!json.contains(&secret));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn shutdown_cancels_the_daemon() {
    let f = Fixture::new().await;
    assert_eq!(f.admin(AdminOp::Shutdown), Response::ShuttingDown);
    assert!(f.ctx.shutdown.is_cancelled());
}

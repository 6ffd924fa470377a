// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{CreateWorkspaceOptions, UpdateWorkspaceOptions};
use yare::parameterized;

fn narrow_pool(h: &Harness, allowed: Vec<rp_core::WorkspaceId>) -> AgentPool {
    h.allocator
        .create_pool(CreatePoolOptions {
            name: "narrow".into(),
            organization: TEST_ORG.into(),
            organization_scoped: false,
            allowed_workspaces: allowed,
        })
        .unwrap()
}

#[parameterized(
    missing_name = { "", "acme" },
    missing_org = { "pool", " " },
)]
fn create_pool_validates(name: &str, organization: &str) {
    let h = Harness::new();
    let err = h
        .allocator
        .create_pool(CreatePoolOptions {
            name: name.into(),
            organization: organization.into(),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn allowed_workspaces_must_exist_in_pool_org() {
    let h = Harness::new();
    let foreign = h
        .workspaces
        .create_workspace(CreateWorkspaceOptions {
            name: "net".into(),
            organization: "globex".into(),
            ..Default::default()
        })
        .unwrap();
    let pool = narrow_pool(&h, Vec::new());

    assert_eq!(
        h.allocator
            .add_allowed_workspace(&pool.id, &foreign.id)
            .unwrap_err()
            .kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        h.allocator
            .add_allowed_workspace(&pool.id, &"ws-404".into())
            .unwrap_err()
            .kind(),
        ErrorKind::ResourceNotFound
    );
}

#[test]
fn allow_list_changes_round_trip() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let pool = narrow_pool(&h, Vec::new());

    let added = h.allocator.add_allowed_workspace(&pool.id, &ws.id).unwrap();
    assert!(added.serves(&ws.id, TEST_ORG));

    let removed = h.allocator.remove_allowed_workspace(&pool.id, &ws.id).unwrap();
    assert!(!removed.serves(&ws.id, TEST_ORG));

    assert_eq!(
        h.allocator
            .remove_allowed_workspace(&pool.id, &ws.id)
            .unwrap_err()
            .kind(),
        ErrorKind::ResourceNotFound
    );
}

#[test]
fn newly_allowed_workspace_gets_its_jobs_placed() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let pool = narrow_pool(&h, Vec::new());
    let (_, secret) = h.allocator.create_agent_token(&pool.id, "ci").unwrap();
    let subject = h.allocator.authenticate(&secret).unwrap();
    let a1 = h.register(&subject, "a1", 1);
    let spec = plan_job(&h, &ws);
    assert_eq!(job(&h, &spec).status, JobStatus::Pending);

    h.allocator.add_allowed_workspace(&pool.id, &ws.id).unwrap();

    assert_eq!(job(&h, &spec).agent_id, Some(a1.id));
}

#[test]
fn pinned_workspace_keeps_its_pool_serving() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let pool = narrow_pool(&h, vec![ws.id.clone()]);
    h.workspaces
        .update_workspace(
            &ws.id,
            UpdateWorkspaceOptions {
                agent_pool_id: Some(Some(pool.id.clone())),
                ..Default::default()
            },
        )
        .unwrap();

    let err = h
        .allocator
        .remove_allowed_workspace(&pool.id, &ws.id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForeignKeyViolation);
    assert!(h.allocator.get_pool(&pool.id).unwrap().allowed_workspaces.contains(&ws.id));
}

#[test]
fn delete_pool_referenced_by_workspace_fails() {
    let h = Harness::new();
    let (pool, _, _) = h.pool("default");
    h.workspaces
        .create_workspace(CreateWorkspaceOptions {
            name: "net".into(),
            organization: TEST_ORG.into(),
            agent_pool_id: Some(pool.id.clone()),
            speculative_enabled: None,
        })
        .unwrap();

    let err = h.allocator.delete_pool(&pool.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForeignKeyViolation);
}

#[test]
fn delete_pool_with_live_agent_fails() {
    let h = Harness::new();
    let (pool, subject, _) = h.pool("default");
    h.register(&subject, "a1", 1);
    let err = h.allocator.delete_pool(&pool.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForeignKeyViolation);
    assert_eq!(h.allocator.list_agent_tokens(&pool.id).unwrap().len(), 1);
}

#[test]
fn delete_pool_removes_tokens_and_exited_agents() {
    let h = Harness::new();
    let (pool, subject, secret) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    h.allocator
        .update_agent_status(&subject, &a1.id, AgentStatus::Exited)
        .unwrap();

    h.allocator.delete_pool(&pool.id).unwrap();

    assert_eq!(
        h.allocator.get_pool(&pool.id).unwrap_err().kind(),
        ErrorKind::ResourceNotFound
    );
    assert!(h.allocator.list_agents(None).unwrap().is_empty());
    assert_eq!(h.allocator.authenticate(&secret).unwrap_err(), Error::AccessNotPermitted);
}

#[test]
fn list_pools_by_organization() {
    let h = Harness::new();
    h.pool("default");
    h.allocator
        .create_pool(CreatePoolOptions {
            name: "theirs".into(),
            organization: "globex".into(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(h.allocator.list_pools(Some(TEST_ORG)).unwrap().len(), 1);
    assert_eq!(h.allocator.list_pools(None).unwrap().len(), 2);
}

#[test]
fn update_pool_renames_and_rescopes() {
    let h = Harness::new();
    let pool = narrow_pool(&h, Vec::new());
    let updated = h
        .allocator
        .update_pool(
            &pool.id,
            UpdatePoolOptions {
                name: Some("wide".into()),
                organization_scoped: Some(true),
                allowed_workspaces: None,
            },
        )
        .unwrap();
    assert_eq!(updated.name, "wide");
    assert!(updated.organization_scoped);
}

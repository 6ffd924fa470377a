// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn token_secret_is_returned_once_and_stored_hashed() {
    let h = Harness::new();
    let (pool, _, _) = h.pool("default");

    let (token, secret) = h.allocator.create_agent_token(&pool.id, "ci runners").unwrap();

    assert!(secret.starts_with(crate::POOL_TOKEN_PREFIX));
    assert_ne!(token.token_hash, secret);
    assert!(!token.token_hash.contains(&secret));
    assert_eq!(token.description, "ci runners");
    let listed = h.allocator.list_agent_tokens(&pool.id).unwrap();
    assert!(listed.contains(&token));
}

#[test]
fn authenticate_resolves_secret_to_its_pool() {
    let h = Harness::new();
    let (pool, _, _) = h.pool("default");
    let (token, secret) = h.allocator.create_agent_token(&pool.id, "second").unwrap();

    let subject = h.allocator.authenticate(&secret).unwrap();

    assert_eq!(subject.pool_id, pool.id);
    assert_eq!(subject.token_id, token.id);
}

#[test]
fn unknown_or_deleted_secret_is_rejected() {
    let h = Harness::new();
    let (_, subject, secret) = h.pool("default");
    assert_eq!(
        h.allocator.authenticate("rpt_nope").unwrap_err(),
        Error::AccessNotPermitted
    );

    h.allocator.delete_agent_token(&subject.token_id).unwrap();
    assert_eq!(
        h.allocator.authenticate(&secret).unwrap_err(),
        Error::AccessNotPermitted
    );
}

#[test]
fn token_for_missing_pool_fails() {
    let h = Harness::new();
    let err = h
        .allocator
        .create_agent_token(&AgentPoolId::new("apool-404"), "x")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

#[test]
fn job_token_is_valid_only_while_running() {
    let h = Harness::new();
    let (_, subject, _) = h.pool("default");
    let a1 = h.register(&subject, "a1", 1);
    let spec = plan_job(&h, &h.workspace("net"));

    let started = h.allocator.start_job(&subject, &a1.id, &spec).unwrap();
    assert_eq!(h.allocator.authenticate_job(&started.token).unwrap().spec, spec);

    h.allocator
        .finish_job(&subject, &a1.id, &spec, FinishJobOptions::finished())
        .unwrap();
    assert_eq!(
        h.allocator.authenticate_job(&started.token).unwrap_err(),
        Error::AccessNotPermitted
    );
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rp_core::test_support::{run, workspace};
use rp_core::{Run, Workspace};

#[test]
fn committed_changes_reach_table_listeners_in_order() {
    let store = MemStore::new();
    let mut ws_feed = store.listen(Table::Workspaces);
    let mut run_feed = store.listen(Table::Runs);

    store
        .tx(|tx| {
            tx.insert(workspace("ws-1"))?;
            tx.insert(run("run-1", "ws-1"))?;
            tx.modify::<Workspace>("ws-1", |ws| {
                ws.speculative_enabled = false;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

    let first = ws_feed.try_recv().unwrap();
    assert_eq!((first.id.as_str(), first.action), ("ws-1", Action::Insert));
    let second = ws_feed.try_recv().unwrap();
    assert_eq!(second.action, Action::Update);
    assert!(ws_feed.try_recv().is_err());

    let run_change = run_feed.try_recv().unwrap();
    assert_eq!(run_change.table, Table::Runs);
    assert_eq!(run_change.id, "run-1");
}

#[test]
fn failed_transaction_publishes_nothing_and_rolls_back() {
    let store = MemStore::new();
    let mut feed = store.listen(Table::Workspaces);

    let err = store
        .tx(|tx| {
            tx.insert(workspace("ws-1"))?;
            tx.insert(run("run-1", "ws-missing"))?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, Error::ResourceNotFound { .. }));
    assert!(feed.try_recv().is_err());
    let found = store.tx(|tx| Ok(tx.find::<Workspace>("ws-1"))).unwrap();
    assert!(found.is_none());
    assert_eq!(store.version(), 0);
}

#[test]
fn read_only_transaction_does_not_bump_version() {
    let store = MemStore::new();
    store.tx(|tx| tx.insert(workspace("ws-1"))).unwrap();
    assert_eq!(store.version(), 1);
    store.tx(|tx| Ok(tx.list::<Run>())).unwrap();
    assert_eq!(store.version(), 1);
}

#[test]
fn dropped_listener_is_pruned() {
    let store = MemStore::new();
    drop(store.listen(Table::Workspaces));
    store.tx(|tx| tx.insert(workspace("ws-1"))).unwrap();
    assert!(store.inner.listeners.lock().is_empty());
}

#[test]
fn lock_table_commits_like_tx() {
    let store = MemStore::new();
    let mut feed = store.listen(Table::Workspaces);
    store
        .lock_table(Table::Workspaces, |tx| tx.insert(workspace("ws-1")))
        .unwrap();
    assert_eq!(feed.try_recv().unwrap().id, "ws-1");
}

#[test]
fn snapshot_round_trips_into_new_store() {
    let store = MemStore::new();
    store.tx(|tx| tx.insert(workspace("ws-1"))).unwrap();
    let restored = MemStore::from_snapshot(store.snapshot());
    assert_eq!(restored.version(), 1);
    let ws = restored.tx(|tx| tx.get::<Workspace>("ws-1")).unwrap();
    assert_eq!(ws.organization, "acme");
}

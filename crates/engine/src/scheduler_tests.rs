// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::Harness;
use parking_lot::Mutex;
use rp_core::test_support::{run, workspace};
use rp_core::{RunStatus, Workspace};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Workspace(String),
    Run(String, RunStatus),
}

type Log = Arc<Mutex<Vec<(String, Seen)>>>;

/// Queue that records what it was handed, tagged with its workspace.
struct RecordingQueue {
    owner: String,
    log: Log,
}

impl RunQueue for RecordingQueue {
    fn handle_workspace(&mut self, workspace: Workspace) -> Result<(), Error> {
        self.log
            .lock()
            .push((self.owner.clone(), Seen::Workspace(workspace.id.to_string())));
        Ok(())
    }

    fn handle_run(&mut self, run: Run) -> Result<(), Error> {
        if run.id == "run-fail" {
            return Err(Error::Internal("boom".into()));
        }
        self.log
            .lock()
            .push((self.owner.clone(), Seen::Run(run.id.to_string(), run.status)));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingFactory {
    log: Log,
}

impl QueueFactory for RecordingFactory {
    type Queue = RecordingQueue;

    fn new_queue(&self, workspace: &Workspace) -> RecordingQueue {
        RecordingQueue {
            owner: workspace.id.to_string(),
            log: Arc::clone(&self.log),
        }
    }
}

fn scheduler() -> (Scheduler<RecordingFactory>, Log) {
    let factory = RecordingFactory::default();
    let log = Arc::clone(&factory.log);
    (Scheduler::new(factory), log)
}

#[test]
fn queue_created_lazily_on_first_workspace_event() {
    let (mut scheduler, log) = scheduler();
    assert_eq!(scheduler.queue_count(), 0);

    scheduler
        .handle_workspace_event(Event::created(workspace("ws-1")))
        .unwrap();
    scheduler
        .handle_workspace_event(Event::updated(workspace("ws-1")))
        .unwrap();

    assert_eq!(scheduler.queue_count(), 1);
    assert!(scheduler.has_queue(&WorkspaceId::new("ws-1")));
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn run_events_route_to_their_workspace_queue() {
    let (mut scheduler, log) = scheduler();
    scheduler
        .handle_workspace_event(Event::created(workspace("ws-1")))
        .unwrap();
    scheduler
        .handle_workspace_event(Event::created(workspace("ws-2")))
        .unwrap();
    log.lock().clear();

    scheduler.handle_run_event(Event::created(run("run-1", "ws-2"))).unwrap();
    scheduler.handle_run_event(Event::created(run("run-2", "ws-1"))).unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            ("ws-2".to_string(), Seen::Run("run-1".into(), RunStatus::Pending)),
            ("ws-1".to_string(), Seen::Run("run-2".into(), RunStatus::Pending)),
        ]
    );
}

#[test]
fn run_event_for_unknown_workspace_is_dropped() {
    let (mut scheduler, log) = scheduler();
    scheduler.handle_run_event(Event::created(run("run-1", "ws-9"))).unwrap();
    assert_eq!(scheduler.queue_count(), 0);
    assert!(log.lock().is_empty());
}

#[test]
fn workspace_delete_discards_queue_and_later_runs() {
    let (mut scheduler, log) = scheduler();
    scheduler
        .handle_workspace_event(Event::created(workspace("ws-1")))
        .unwrap();
    scheduler
        .handle_workspace_event(Event::deleted(Workspace::tombstone(WorkspaceId::new("ws-1"))))
        .unwrap();
    assert!(!scheduler.has_queue(&WorkspaceId::new("ws-1")));

    log.lock().clear();
    scheduler.handle_run_event(Event::updated(run("run-1", "ws-1"))).unwrap();
    assert!(log.lock().is_empty());
}

#[test]
fn deleting_unknown_workspace_is_a_noop() {
    let (mut scheduler, log) = scheduler();
    scheduler
        .handle_workspace_event(Event::deleted(Workspace::tombstone(WorkspaceId::new("ws-1"))))
        .unwrap();
    assert_eq!(scheduler.queue_count(), 0);
    assert!(log.lock().is_empty());
}

#[test]
fn queue_errors_are_returned_to_the_caller() {
    let (mut scheduler, _log) = scheduler();
    scheduler
        .handle_workspace_event(Event::created(workspace("ws-1")))
        .unwrap();
    let err = scheduler
        .handle_run_event(Event::created(run("run-fail", "ws-1")))
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}

#[test]
fn resync_replays_workspaces_then_unfinished_runs_in_creation_order() {
    let h = Harness::new();
    let ws = h.workspace("net");
    let first = h.create_run(&ws, false);
    let second = h.create_run(&ws, false);
    let done = h.create_run(&ws, false);
    h.runs.cancel_run(&done.id, false).unwrap();

    let (mut scheduler, log) = scheduler();
    scheduler.resync(&h.store).unwrap();

    let owner = ws.id.to_string();
    assert_eq!(
        *log.lock(),
        vec![
            (owner.clone(), Seen::Workspace(owner.clone())),
            (owner.clone(), Seen::Run(first.id.to_string(), RunStatus::Pending)),
            (owner.clone(), Seen::Run(second.id.to_string(), RunStatus::Pending)),
        ]
    );
}

#[test]
fn resync_drops_queues_of_vanished_workspaces() {
    let h = Harness::new();
    let kept = h.workspace("kept");

    let (mut scheduler, _log) = scheduler();
    scheduler
        .handle_workspace_event(Event::created(workspace("ws-gone")))
        .unwrap();
    scheduler.resync(&h.store).unwrap();

    assert!(scheduler.has_queue(&kept.id));
    assert!(!scheduler.has_queue(&WorkspaceId::new("ws-gone")));
}

#[tokio::test]
async fn dispatch_loop_delivers_events_and_stops_on_cancel() {
    let h = Harness::new();
    let brokers = crate::Brokers::new(&h.store);
    let cancel = CancellationToken::new();
    let relays = brokers.spawn(&h.store, &cancel);
    let ws = h.workspace("net");

    let (scheduler, log) = scheduler();
    let task = tokio::spawn(scheduler.run(
        h.store.clone(),
        brokers.workspaces.clone(),
        brokers.runs.clone(),
        cancel.clone(),
    ));

    // The initial resync creates the queue; wait for it before producing runs.
    while brokers.runs.subscriber_count() == 0 {
        tokio::task::yield_now().await;
    }
    let run = h.create_run(&ws, false);

    let expected = (ws.id.to_string(), Seen::Run(run.id.to_string(), RunStatus::Pending));
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !log.lock().contains(&expected) {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("run event delivered");

    cancel.cancel();
    task.await.unwrap();
    for relay in relays {
        relay.await.unwrap();
    }
}

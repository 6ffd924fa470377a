// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fan-out of store changes to live subscribers.
//!
//! Each subscriber owns a bounded mailbox. Forwarding never blocks: a
//! subscriber whose mailbox is full is dropped and its channel closed, so
//! consumers that need every change must resync from the store.

use parking_lot::Mutex;
use rp_core::{Action, Error, Event};
use rp_storage::{ChangeReceiver, Record, Store, Table};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Mailbox capacity of every subscription.
pub const SUBSCRIBER_BUFFER: usize = 100;

/// Fetches the current payload for a changed row. Called with
/// [`Action::Delete`] after the row is gone, so it must synthesize a
/// deletion payload from the ID.
pub type Getter<T> = Arc<dyn Fn(&str, Action) -> Result<T, Error> + Send + Sync>;

type Subscribers<T> = Mutex<HashMap<u64, mpsc::Sender<Event<T>>>>;

struct Inner<T> {
    table: Table,
    getter: Getter<T>,
    subscribers: Arc<Subscribers<T>>,
    next_id: AtomicU64,
}

pub struct Broker<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Broker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Broker<T> {
    pub fn new(table: Table, getter: Getter<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table,
                getter,
                subscribers: Arc::new(Mutex::new(HashMap::new())),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn table(&self) -> Table {
        self.inner.table
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.inner.subscribers.lock().insert(id, sender);
        debug!(table = %self.inner.table, subscriber = id, "subscribed");
        Subscription {
            id,
            receiver,
            subscribers: Arc::downgrade(&self.inner.subscribers),
            dropped: CancellationToken::new(),
        }
    }

    /// Subscribe until `cancel` fires. Must be called within a tokio runtime.
    pub fn subscribe_until(&self, cancel: CancellationToken) -> Subscription<T> {
        let sub = self.subscribe();
        let id = sub.id;
        let subscribers = sub.subscribers.clone();
        let dropped = sub.dropped.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => remove(&subscribers, id),
                _ = dropped.cancelled() => {}
            }
        });
        sub
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Look up the changed row and push it to every subscriber.
    pub fn forward(&self, id: &str, action: Action) {
        if self.inner.subscribers.lock().is_empty() {
            return;
        }
        let payload = match (self.inner.getter)(id, action) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(table = %self.inner.table, id, error = %e, "dropping change, lookup failed");
                return;
            }
        };
        let event = Event::new(action.into(), payload);

        let table = self.inner.table;
        self.inner
            .subscribers
            .lock()
            .retain(|sub, sender| match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(%table, subscriber = sub, "mailbox full, dropping subscriber");
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }

    /// Pump a store change feed into [`Broker::forward`] until cancelled.
    pub async fn relay(self, mut changes: ChangeReceiver, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                change = changes.recv() => match change {
                    Some(change) => self.forward(&change.id, change.action),
                    None => break,
                },
            }
        }
        debug!(table = %self.inner.table, "broker relay stopped");
    }
}

/// Getter reading the committed row from `store`. Deletions are answered by
/// `tombstone`, or fail for tables whose rows are never deleted.
pub fn store_getter<S: Store, R: Record>(store: S, tombstone: Option<fn(&str) -> R>) -> Getter<R> {
    Arc::new(move |id: &str, action: Action| match action {
        Action::Delete => tombstone
            .map(|make| make(id))
            .ok_or_else(|| Error::Internal(format!("unexpected deletion of {} {}", R::KIND, id))),
        Action::Insert | Action::Update => store.tx(|tx| tx.get::<R>(id)),
    })
}

fn remove<T>(subscribers: &Weak<Subscribers<T>>, id: u64) {
    if let Some(subscribers) = subscribers.upgrade() {
        subscribers.lock().remove(&id);
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::Receiver<Event<T>>,
    subscribers: Weak<Subscribers<T>>,
    /// Fired on drop to stop the `subscribe_until` watcher.
    dropped: CancellationToken,
}

impl<T> Subscription<T> {
    /// Next event, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Event<T>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Event<T>> {
        self.receiver.try_recv().ok()
    }

    /// Remove this subscription. Buffered events can still be received.
    pub fn unsubscribe(&self) {
        remove(&self.subscribers, self.id);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dropped.cancel();
        remove(&self.subscribers, self.id);
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;

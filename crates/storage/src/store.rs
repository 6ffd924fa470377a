// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transactional store and its change feed

use crate::snapshot::Snapshot;
use crate::tables::{Table, Tables};
use crate::tx::Tx;
use parking_lot::Mutex;
use rp_core::{Action, Error};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A committed row change, as published on the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub table: Table,
    pub id: String,
    pub action: Action,
}

pub type ChangeReceiver = mpsc::UnboundedReceiver<Change>;

/// Transactional persistence consumed by the control plane.
///
/// Closures passed to `tx` and `lock_table` must not call back into the
/// store.
pub trait Store: Clone + Send + Sync + 'static {
    /// Run `f` in a transaction. On error every write is rolled back and no
    /// changes are published.
    fn tx<T>(&self, f: impl FnOnce(&mut Tx<'_>) -> Result<T, Error>) -> Result<T, Error>;

    /// Run `f` holding an exclusive lock on `table`.
    fn lock_table<T>(
        &self,
        table: Table,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, Error>,
    ) -> Result<T, Error>;

    /// Subscribe to committed changes of `table`, in commit order.
    fn listen(&self, table: Table) -> ChangeReceiver;
}

struct Listener {
    table: Table,
    sender: mpsc::UnboundedSender<Change>,
}

struct Inner {
    tables: Mutex<Tables>,
    listeners: Mutex<Vec<Listener>>,
    version: AtomicU64,
}

/// In-memory store. Transactions are fully serialized, which subsumes
/// both row and table locks.
#[derive(Clone)]
pub struct MemStore {
    inner: Arc<Inner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::with_tables(Tables::default(), 0)
    }

    pub fn with_tables(tables: Tables, version: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(tables),
                listeners: Mutex::new(Vec::new()),
                version: AtomicU64::new(version),
            }),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self::with_tables(snapshot.tables, snapshot.version)
    }

    /// Number of committed transactions that wrote at least one row.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Consistent copy of every table.
    pub fn snapshot(&self) -> Snapshot {
        let tables = self.inner.tables.lock();
        Snapshot::new(self.version(), tables.clone())
    }

    fn run<T>(&self, f: impl FnOnce(&mut Tx<'_>) -> Result<T, Error>) -> Result<T, Error> {
        let mut tables = self.inner.tables.lock();
        let mut tx = Tx::new(&mut tables);
        match f(&mut tx) {
            Ok(value) => {
                let changes = tx.commit();
                if !changes.is_empty() {
                    self.inner.version.fetch_add(1, Ordering::SeqCst);
                    // Published under the table lock so feed order is commit order.
                    self.publish(changes);
                }
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                trace!(error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }

    fn publish(&self, changes: Vec<Change>) {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|l| !l.sender.is_closed());
        for change in changes {
            for listener in listeners.iter().filter(|l| l.table == change.table) {
                let _ = listener.sender.send(change.clone());
            }
        }
    }
}

impl Store for MemStore {
    fn tx<T>(&self, f: impl FnOnce(&mut Tx<'_>) -> Result<T, Error>) -> Result<T, Error> {
        self.run(f)
    }

    fn lock_table<T>(
        &self,
        table: Table,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        debug!(%table, "exclusive table lock");
        self.run(f)
    }

    fn listen(&self, table: Table) -> ChangeReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.listeners.lock().push(Listener { table, sender });
        receiver
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

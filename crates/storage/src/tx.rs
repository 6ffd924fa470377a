// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactions over [`Tables`]
//!
//! Writes are applied in place and recorded in an undo log. A transaction
//! whose closure fails is rolled back by replaying the log in reverse.

use crate::store::Change;
use crate::tables::{Record, Tables};
use rp_core::{Action, Error};

type Undo = Box<dyn FnOnce(&mut Tables) + Send>;

pub struct Tx<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    changes: Vec<Change>,
}

impl<'a> Tx<'a> {
    pub(crate) fn new(tables: &'a mut Tables) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn find<R: Record>(&self, key: &str) -> Option<R> {
        R::rows(self.tables).get(key).cloned()
    }

    pub fn get<R: Record>(&self, key: &str) -> Result<R, Error> {
        self.find(key).ok_or_else(|| Error::not_found(R::KIND, key))
    }

    /// Read a row for modification. The store serializes transactions,
    /// so the row stays locked until commit.
    pub fn get_for_update<R: Record>(&mut self, key: &str) -> Result<R, Error> {
        self.get(key)
    }

    pub fn list<R: Record>(&self) -> Vec<R> {
        R::rows(self.tables).values().cloned().collect()
    }

    pub fn filter<R: Record>(&self, pred: impl Fn(&R) -> bool) -> Vec<R> {
        R::rows(self.tables)
            .values()
            .filter(|row| pred(row))
            .cloned()
            .collect()
    }

    pub fn insert<R: Record>(&mut self, row: R) -> Result<(), Error> {
        let key = row.key();
        if R::rows(self.tables).contains_key(&key) {
            return Err(Error::already_exists(R::KIND, key));
        }
        row.check_references(self.tables)?;
        R::rows_mut(self.tables).insert(key.clone(), row);
        self.record::<R>(key, None, Action::Insert);
        Ok(())
    }

    pub fn update<R: Record>(&mut self, row: R) -> Result<(), Error> {
        let key = row.key();
        if !R::rows(self.tables).contains_key(&key) {
            return Err(Error::not_found(R::KIND, key));
        }
        row.check_references(self.tables)?;
        let prev = R::rows_mut(self.tables).insert(key.clone(), row);
        self.record(key, prev, Action::Update);
        Ok(())
    }

    /// Select a row for update, apply `f`, and write it back.
    pub fn modify<R: Record>(
        &mut self,
        key: &str,
        f: impl FnOnce(&mut R) -> Result<(), Error>,
    ) -> Result<R, Error> {
        let mut row = self.get_for_update::<R>(key)?;
        f(&mut row)?;
        if row.key() != key {
            return Err(Error::Internal(format!(
                "{} key changed from {} to {}",
                R::KIND,
                key,
                row.key()
            )));
        }
        self.update(row.clone())?;
        Ok(row)
    }

    pub fn delete<R: Record>(&mut self, key: &str) -> Result<R, Error> {
        if !R::rows(self.tables).contains_key(key) {
            return Err(Error::not_found(R::KIND, key));
        }
        R::check_delete(self.tables, key)?;
        let prev = R::rows_mut(self.tables)
            .remove(key)
            .ok_or_else(|| Error::not_found(R::KIND, key))?;
        self.record(key.to_string(), Some(prev.clone()), Action::Delete);
        Ok(prev)
    }

    fn record<R: Record>(&mut self, key: String, prev: Option<R>, action: Action) {
        self.changes.push(Change {
            table: R::TABLE,
            id: key.clone(),
            action,
        });
        self.undo.push(Box::new(move |tables: &mut Tables| {
            let rows = R::rows_mut(tables);
            match prev {
                Some(prev) => {
                    rows.insert(key, prev);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }));
    }

    pub(crate) fn commit(self) -> Vec<Change> {
        self.changes
    }

    pub(crate) fn rollback(self) {
        let Tx { tables, undo, .. } = self;
        for step in undo.into_iter().rev() {
            step(&mut *tables);
        }
    }
}

#[cfg(test)]
#[path = "tx_tests.rs"]
mod tests;

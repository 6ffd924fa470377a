// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for the run control plane

mod snapshot;
mod store;
mod tables;
mod tx;

pub use snapshot::{Snapshot, SnapshotError};
pub use store::{Change, ChangeReceiver, MemStore, Store};
pub use tables::{Record, Table, Tables};
pub use tx::Tx;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rp-agent: the process that executes run phases on behalf of a pool.
//!
//! An agent registers with a pool token, heartbeats, polls for allocated
//! jobs, runs them through a [`PhaseExecutor`], and reports the outcome.

pub mod client;
mod daemon;
pub mod env;
pub mod executor;

pub use client::{AgentClient, ClientError, InProcClient, Registration, RemoteClient};
pub use daemon::{AgentConfig, AgentDaemon};
pub use executor::{CommandExecutor, ExecuteError, PhaseExecutor};

#[cfg(any(test, feature = "test-support"))]
pub use executor::{FakeExecutor, FakeOutcome};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specifications for the run control plane.
//!
//! These tests wire the real crates together: store, brokers, scheduler,
//! allocator and agents in-process, and the daemon over TCP.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// runs/
#[path = "specs/runs/lifecycle.rs"]
mod runs_lifecycle;
#[path = "specs/runs/cancellation.rs"]
mod runs_cancellation;

// agents/
#[path = "specs/agents/capacity.rs"]
mod agents_capacity;

// broker/
#[path = "specs/broker/overflow.rs"]
mod broker_overflow;

// daemon/
#[path = "specs/daemon/remote.rs"]
mod daemon_remote;

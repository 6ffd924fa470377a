// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rp-core: data model shared by the run control plane

pub mod agent;
pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod job;
pub mod run;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{Agent, AgentId, AgentPool, AgentPoolId, AgentStatus, AgentToken, AgentTokenId};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{Error, ErrorKind};
pub use event::{Action, Event, EventType};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use job::{Job, JobSpec, JobStatus, Signal};
pub use run::{Phase, Run, RunId, RunStatus};
pub use workspace::{LockHolder, Workspace, WorkspaceId};

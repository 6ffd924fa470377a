// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rp-engine: event broker, run scheduler, workspace queues, and the
//! job/agent allocator

pub mod allocator;
mod broker;
mod brokers;
mod queue;
mod runs;
mod scheduler;
mod secret;
mod workspaces;

#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;

pub use allocator::{
    Allocation, Allocator, AllocatorConfig, CreatePoolOptions, FinishJobOptions, PoolSubject,
    ReapReport, ReaperConfig, RegisterAgentOptions, StartedJob, UpdatePoolOptions,
};
pub use broker::{store_getter, Broker, Getter, Subscription, SUBSCRIBER_BUFFER};
pub use brokers::Brokers;
pub use queue::{WorkspaceQueue, WorkspaceQueueFactory};
pub use runs::{CreateRunOptions, Runs};
pub use scheduler::{QueueFactory, RunQueue, Scheduler};
pub use secret::{JOB_TOKEN_PREFIX, POOL_TOKEN_PREFIX};
pub use workspaces::{CreateWorkspaceOptions, UpdateWorkspaceOptions, Workspaces};

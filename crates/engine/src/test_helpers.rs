// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test harness for the engine and the crates built on it.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

#![allow(clippy::unwrap_used)]

use crate::{
    Allocator, CreatePoolOptions, CreateRunOptions, CreateWorkspaceOptions, PoolSubject,
    RegisterAgentOptions, Runs, Scheduler, WorkspaceQueue, WorkspaceQueueFactory, Workspaces,
};
use rp_core::test_support::TEST_ORG;
use rp_core::{Agent, AgentPool, FakeClock, IdGen, Run, SequentialIdGen, Workspace};
use rp_storage::MemStore;
use std::sync::Arc;
use std::time::Duration;

pub type TestAllocator = Allocator<MemStore, FakeClock>;
pub type TestScheduler = Scheduler<WorkspaceQueueFactory<MemStore, FakeClock>>;

/// Services over one in-memory store, a fake clock, and sequential IDs.
pub struct Harness {
    pub store: MemStore,
    pub clock: FakeClock,
    pub allocator: Arc<TestAllocator>,
    pub runs: Runs<MemStore, FakeClock>,
    pub workspaces: Workspaces<MemStore, FakeClock>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let store = MemStore::new();
        let clock = FakeClock::new();
        let ids: Arc<dyn IdGen> = Arc::new(SequentialIdGen::new());
        Self {
            allocator: Arc::new(Allocator::with_id_gen(
                store.clone(),
                clock.clone(),
                Arc::clone(&ids),
            )),
            runs: Runs::new(store.clone(), clock.clone(), Arc::clone(&ids)),
            workspaces: Workspaces::new(store.clone(), clock.clone(), ids),
            store,
            clock,
        }
    }

    /// Create an organization-scoped pool and a token for it.
    pub fn pool(&self, name: &str) -> (AgentPool, PoolSubject, String) {
        let pool = self
            .allocator
            .create_pool(CreatePoolOptions {
                name: name.to_string(),
                organization: TEST_ORG.to_string(),
                organization_scoped: true,
                allowed_workspaces: Vec::new(),
            })
            .unwrap();
        let (_, secret) = self.allocator.create_agent_token(&pool.id, "test").unwrap();
        let subject = self.allocator.authenticate(&secret).unwrap();
        (pool, subject, secret)
    }

    pub fn workspace(&self, name: &str) -> Workspace {
        self.workspaces
            .create_workspace(CreateWorkspaceOptions {
                name: name.to_string(),
                organization: TEST_ORG.to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    pub fn register(&self, subject: &PoolSubject, name: &str, max_jobs: u32) -> Agent {
        self.allocator
            .register_agent(
                subject,
                RegisterAgentOptions {
                    name: name.to_string(),
                    version: "test".to_string(),
                    max_jobs,
                    ip_address: [127, 0, 0, 1].into(),
                },
            )
            .unwrap()
    }

    /// Create a run, then step the clock so creation order is unambiguous.
    pub fn create_run(&self, workspace: &Workspace, plan_only: bool) -> Run {
        let mut opts = CreateRunOptions::new(workspace.id.clone());
        opts.plan_only = plan_only;
        let run = self.runs.create_run(opts).unwrap();
        self.clock.advance(Duration::from_millis(1));
        run
    }

    pub fn queue(&self, workspace: &Workspace) -> WorkspaceQueue<MemStore, FakeClock> {
        WorkspaceQueue::new(workspace.clone(), Arc::clone(&self.allocator))
    }

    pub fn scheduler(&self) -> TestScheduler {
        Scheduler::new(WorkspaceQueueFactory::new(Arc::clone(&self.allocator)))
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool tokens and per-job tokens

use super::{Allocator, PoolSubject};
use crate::secret;
use rp_core::{
    AgentPool, AgentPoolId, AgentToken, AgentTokenId, Clock, Error, Job, JobStatus,
};
use rp_storage::Store;
use tracing::info;

impl<S: Store, C: Clock> Allocator<S, C> {
    /// Mint a token for `pool_id`. The secret is returned once and never stored.
    pub fn create_agent_token(
        &self,
        pool_id: &AgentPoolId,
        description: impl Into<String>,
    ) -> Result<(AgentToken, String), Error> {
        let secret = secret::generate(secret::POOL_TOKEN_PREFIX);
        let token = AgentToken {
            id: AgentTokenId::new(self.ids.next("at")),
            agent_pool_id: pool_id.clone(),
            description: description.into(),
            token_hash: secret::digest(&secret),
            created_at_ms: self.clock.epoch_ms(),
        };
        self.store.tx(|tx| {
            tx.get::<AgentPool>(pool_id.as_str())?;
            tx.insert(token.clone())
        })?;
        info!(token_id = %token.id, pool = %pool_id, "agent token created");
        Ok((token, secret))
    }

    pub fn delete_agent_token(&self, token_id: &AgentTokenId) -> Result<AgentToken, Error> {
        let token = self
            .store
            .tx(|tx| tx.delete::<AgentToken>(token_id.as_str()))?;
        info!(token_id = %token_id, "agent token deleted");
        Ok(token)
    }

    pub fn list_agent_tokens(&self, pool_id: &AgentPoolId) -> Result<Vec<AgentToken>, Error> {
        self.store
            .tx(|tx| Ok(tx.filter::<AgentToken>(|t| &t.agent_pool_id == pool_id)))
    }

    /// Resolve a pool token secret to exactly one pool.
    pub fn authenticate(&self, secret: &str) -> Result<PoolSubject, Error> {
        let digest = secret::digest(secret);
        self.store.tx(|tx| {
            tx.filter::<AgentToken>(|t| t.token_hash == digest)
                .into_iter()
                .next()
                .map(|t| PoolSubject {
                    pool_id: t.agent_pool_id,
                    token_id: t.id,
                })
                .ok_or(Error::AccessNotPermitted)
        })
    }

    /// Resolve a per-job token to its job, while that job is running.
    pub fn authenticate_job(&self, secret: &str) -> Result<Job, Error> {
        let digest = secret::digest(secret);
        self.store.tx(|tx| {
            tx.filter::<Job>(|j| {
                j.status == JobStatus::Running && j.token_hash.as_deref() == Some(digest.as_str())
            })
            .into_iter()
            .next()
            .ok_or(Error::AccessNotPermitted)
        })
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer secrets: random on mint, stored only as a SHA-256 digest

use sha2::{Digest, Sha256};

/// Prefix of agent pool tokens.
pub const POOL_TOKEN_PREFIX: &str = "rpt_";

/// Prefix of per-job tokens.
pub const JOB_TOKEN_PREFIX: &str = "rpj_";

pub(crate) fn generate(prefix: &str) -> String {
    let bytes: [u8; 32] = rand::random();
    format!("{}{}", prefix, hex(&bytes))
}

pub(crate) fn digest(secret: &str) -> String {
    hex(&Sha256::digest(secret.as_bytes()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;

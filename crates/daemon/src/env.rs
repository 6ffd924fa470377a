// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Path to an optional TOML config file
pub const CONFIG: &str = "RP_CONFIG";
pub const STATE_DIR: &str = "RP_STATE_DIR";
pub const LISTEN: &str = "RP_LISTEN";
pub const ADMIN_TOKEN: &str = "RP_ADMIN_TOKEN";
pub const SWEEP_INTERVAL_MS: &str = "RP_SWEEP_INTERVAL_MS";
pub const CHECKPOINT_INTERVAL_MS: &str = "RP_CHECKPOINT_INTERVAL_MS";
pub const AGENT_UNKNOWN_AFTER_MS: &str = "RP_AGENT_UNKNOWN_AFTER_MS";
pub const JOB_LEASE_TIMEOUT_MS: &str = "RP_JOB_LEASE_TIMEOUT_MS";

/// Process environment lookup, skipping empty values.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Default state directory: XDG_STATE_HOME/rp > ~/.local/state/rp
pub fn default_state_dir(lookup: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(xdg) = lookup("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("rp"));
    }
    lookup("HOME").map(|home| PathBuf::from(home).join(".local/state/rp"))
}

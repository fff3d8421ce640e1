// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use crate::lifecycle::LifecycleError;
use hive_core::Limits;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon version string (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the state root: HIVE_STATE_DIR > XDG_STATE_HOME/hive >
/// ~/.local/state/hive.
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("HIVE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("hive"));
    }
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .map(|d| d.join("hive"))
        .ok_or(LifecycleError::NoStateDir)
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Resource limits, each overridable from the environment.
pub fn limits() -> Limits {
    let mut limits = Limits::default();
    if let Some(n) = parsed("MAX_AGENTS") {
        limits.max_agents = n;
    }
    if let Some(n) = parsed("MAX_AGENT_DEPTH") {
        limits.max_depth = n;
    }
    if let Some(n) = parsed("MAX_CHILDREN_PER_AGENT") {
        limits.max_children = n;
    }
    if let Some(n) = parsed("SESSION_TTL_MS") {
        limits.session_ttl_ms = n;
    }
    if let Some(n) = parsed("DELIVERY_SETTLE_MS") {
        limits.delivery_settle_ms = n;
    }
    limits
}

/// Shared read-only context directory symlinked into workspaces.
pub fn shared_context_dir() -> Option<PathBuf> {
    std::env::var("SHARED_CONTEXT_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Persistent repository cache symlinked into workspaces.
pub fn repos_dir() -> Option<PathBuf> {
    std::env::var("HIVE_REPOS_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Mounted object-store directory for the kill switch's remote replica
/// (a FUSE-mounted bucket or any shared volume).
pub fn object_store_dir() -> Option<PathBuf> {
    std::env::var("OBJECT_STORE_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Agent CLI binary.
pub fn agent_bin() -> String {
    std::env::var("HIVE_AGENT_BIN").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "claude".to_string())
}

/// Log filter (tracing EnvFilter syntax).
pub fn log_filter() -> String {
    std::env::var("HIVE_LOG").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "info".to_string())
}

/// Assignment loop period.
pub fn assignment_interval() -> Duration {
    parsed("HIVE_ASSIGN_INTERVAL_MS")
        .map(Duration::from_millis)
        .unwrap_or(hive_orchestrator::ASSIGNMENT_INTERVAL)
}

/// Whether this daemon owns its container outright, enabling the
/// emergency sweep of untracked processes.
pub fn containerized() -> bool {
    std::env::var("HIVE_CONTAINERIZED").map(|v| v == "1" || v == "true").unwrap_or(false)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;

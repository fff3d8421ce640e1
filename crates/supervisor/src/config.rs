// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration and the service-token source.

use hive_core::Limits;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Paths and knobs for one supervisor instance.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Agent state files and the tombstone.
    pub state_dir: PathBuf,
    /// Per-agent JSONL event logs.
    pub events_dir: PathBuf,
    /// Root for per-agent scratch workspaces.
    pub workspaces_dir: PathBuf,
    /// Per-agent working-memory files.
    pub memory_dir: PathBuf,
    /// Read-only shared context symlinked into every workspace.
    pub shared_context_dir: Option<PathBuf>,
    /// Persistent repository checkouts symlinked into every workspace.
    pub repos_dir: Option<PathBuf>,
    /// Agent CLI binary.
    pub agent_bin: String,
    /// `--max-turns` default when the caller does not specify one.
    pub default_max_turns: u32,
    pub limits: Limits,
    /// Whether `emergency_destroy_all` also SIGKILLs every visible
    /// non-init process to catch untracked descendants. Only sane inside a
    /// dedicated container; never enabled in tests.
    pub sweep_untracked_on_emergency: bool,
}

impl SupervisorConfig {
    /// Standard layout under one root directory.
    pub fn under_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            state_dir: root.join("state"),
            events_dir: root.join("events"),
            workspaces_dir: root.join("workspaces"),
            memory_dir: root.join("memory"),
            shared_context_dir: None,
            repos_dir: None,
            agent_bin: "claude".to_string(),
            default_max_turns: 50,
            limits: Limits::default(),
            sweep_untracked_on_emergency: false,
        }
    }
}

/// Issues and rotates per-agent service tokens.
///
/// Tokens embed a rotating seed fragment; rotating the seed invalidates
/// every previously issued token at the host's verification layer.
pub struct TokenSource {
    seed: Mutex<String>,
}

impl TokenSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { seed: Mutex::new(fresh_seed()) })
    }

    /// Issue a fresh token for an agent.
    pub fn issue(&self, agent_id: &str) -> String {
        let seed = self.seed.lock().clone();
        let nonce = Uuid::new_v4().simple().to_string();
        format!("hv_{seed}_{}_{nonce}", &agent_id[..agent_id.len().min(8)])
    }

    /// Invalidate all outstanding tokens.
    pub fn rotate(&self) {
        *self.seed.lock() = fresh_seed();
        tracing::info!("service token seed rotated");
    }

    /// Current seed fragment, for host-side verification.
    pub fn seed(&self) -> String {
        self.seed.lock().clone()
    }
}

fn fresh_seed() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

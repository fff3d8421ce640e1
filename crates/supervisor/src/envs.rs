// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child environment construction.
//!
//! Children get an allowlisted environment, never the daemon's. Runtime
//! basics and integration tokens pass through; server-side secrets (signing
//! keys, admin keys, cloud credentials) never do. Two hard-coded keys are
//! cleared so the CLI's nested-session detection stays quiet inside a
//! supervised child.

use crate::config::{SupervisorConfig, TokenSource};
use hive_core::Agent;
use std::collections::HashMap;

/// Environment variables forwarded from the daemon when present.
const PASSTHROUGH: &[&str] = &[
    // Runtime basics
    "PATH",
    "HOME",
    "USER",
    "SHELL",
    "TERM",
    "TZ",
    "LANG",
    "LC_ALL",
    "NODE_OPTIONS",
    "XDG_CACHE_HOME",
    "XDG_CONFIG_HOME",
    "XDG_DATA_HOME",
    // Integration tokens agents are permitted to use
    "ANTHROPIC_API_KEY",
    "CLAUDE_CODE_OAUTH_TOKEN",
    "GITHUB_TOKEN",
    "GH_TOKEN",
];

/// Build the full child environment for an agent.
pub(crate) fn build_env(
    config: &SupervisorConfig,
    agent: &Agent,
    tokens: &TokenSource,
) -> HashMap<String, String> {
    let mut env = HashMap::new();
    for key in PASSTHROUGH {
        if let Ok(value) = std::env::var(key) {
            env.insert((*key).to_string(), value);
        }
    }

    // Cleared so the CLI does not refuse to start under another session.
    env.insert("CLAUDECODE".into(), String::new());
    env.insert("CLAUDE_CODE_ENTRYPOINT".into(), String::new());

    env.insert("HIVE_AGENT_ID".into(), agent.id.to_string());
    env.insert("HIVE_AGENT_TOKEN".into(), tokens.issue(agent.id.as_str()));
    env.insert("HIVE_WORKSPACE".into(), agent.workspace_dir.display().to_string());
    if let Some(parent) = &agent.parent_id {
        env.insert("HIVE_PARENT_ID".into(), parent.to_string());
    }
    if let Some(shared) = &config.shared_context_dir {
        env.insert("SHARED_CONTEXT_DIR".into(), shared.display().to_string());
    }
    env
}

#[cfg(test)]
#[path = "envs_tests.rs"]
mod tests;

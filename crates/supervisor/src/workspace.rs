// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace provisioner.
//!
//! Each agent gets a scratch directory containing a symlinked shared
//! context, an optional symlinked repository cache, a generated instruction
//! file describing the environment, and a per-agent service token file.
//! `ensure_workspace` is idempotent modulo the rotating token.

use crate::config::{SupervisorConfig, TokenSource};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Name of the generated instruction file inside every workspace.
pub const INSTRUCTIONS_FILE: &str = "INSTRUCTIONS.md";
/// Name of the service token file inside every workspace.
pub const TOKEN_FILE: &str = ".hive-token";

/// Workspace directory for an agent: `{root}/{name}-{id prefix}`.
pub(crate) fn workspace_dir(config: &SupervisorConfig, name: &str, id: &str) -> PathBuf {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let prefix = &id[..id.len().min(8)];
    config.workspaces_dir.join(format!("{safe}-{prefix}"))
}

/// Create or refresh an agent's workspace.
pub(crate) fn ensure_workspace(
    config: &SupervisorConfig,
    dir: &Path,
    agent_name: &str,
    agent_id: &str,
    tokens: &TokenSource,
) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;

    if let Some(shared) = &config.shared_context_dir {
        link_into(shared, &dir.join("shared"));
    }
    if let Some(repos) = &config.repos_dir {
        link_into(repos, &dir.join("repos"));
    }

    std::fs::write(dir.join(INSTRUCTIONS_FILE), instructions(agent_name, agent_id, config))?;
    write_token_file(dir, &tokens.issue(agent_id))?;
    Ok(())
}

/// Re-issue the token file only; used by the hourly refresh loop.
pub(crate) fn refresh_token(
    dir: &Path,
    agent_id: &str,
    tokens: &TokenSource,
) -> std::io::Result<()> {
    write_token_file(dir, &tokens.issue(agent_id))
}

/// Atomic token write: temp file + rename, mode 0o600.
fn write_token_file(dir: &Path, token: &str) -> std::io::Result<()> {
    let temp = dir.join(format!("{TOKEN_FILE}.tmp"));
    std::fs::write(&temp, token)?;
    std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600))?;
    std::fs::rename(&temp, dir.join(TOKEN_FILE))
}

fn link_into(target: &Path, link: &Path) {
    if link.exists() || link.symlink_metadata().is_ok() {
        return;
    }
    if let Err(e) = std::os::unix::fs::symlink(target, link) {
        tracing::warn!(target = %target.display(), link = %link.display(), error = %e, "symlink failed");
    }
}

/// The generated instruction file. Describes the workspace layout and the
/// coordination surface agents use to reach the daemon.
fn instructions(agent_name: &str, agent_id: &str, config: &SupervisorConfig) -> String {
    let shared = if config.shared_context_dir.is_some() {
        "- `shared/` — read-only shared context for all agents\n"
    } else {
        ""
    };
    let repos = if config.repos_dir.is_some() {
        "- `repos/` — persistent repository checkouts (do not delete)\n"
    } else {
        ""
    };
    format!(
        "# Workspace\n\n\
         You are agent **{agent_name}** (`{agent_id}`), one of several agents\n\
         coordinated by a supervising daemon.\n\n\
         ## Layout\n\n\
         {shared}{repos}\
         - `.attachments/` — files attached to your prompts\n\
         - `{TOKEN_FILE}` — your service token (rotates hourly; never print it)\n\n\
         ## Coordination\n\n\
         Your service token authenticates you to the daemon API named by\n\
         `HIVE_API`. Use it to post messages to other agents, query your\n\
         unread messages, and report task results. Message types: task,\n\
         result, question, info, status, interrupt.\n\n\
         Working memory: keep durable notes in your memory file; the\n\
         workspace itself may be pruned between turns.\n"
    )
}

/// Working-memory file path for an agent.
pub(crate) fn memory_file(config: &SupervisorConfig, id: &str) -> PathBuf {
    config.memory_dir.join(format!("{id}.md"))
}

/// Remove an agent's workspace tree and any worktree checkouts registered
/// under the repository cache.
pub(crate) fn remove_workspace(config: &SupervisorConfig, dir: &Path, agent_id: &str) {
    if let Some(repos) = &config.repos_dir {
        let worktrees = repos.join("worktrees").join(agent_id);
        if worktrees.exists() {
            if let Err(e) = std::fs::remove_dir_all(&worktrees) {
                tracing::warn!(agent_id, error = %e, "worktree cleanup failed");
            }
        }
    }
    if dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!(path = %dir.display(), error = %e, "workspace removal failed");
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup cleanup: orphaned agent processes and stale workspaces.
//!
//! After a daemon crash, agent children may still be running (they are
//! spawned detached) and workspace directories may reference agents whose
//! state files are gone. Both are reaped before the new instance takes
//! over.

use hive_supervisor::Supervisor;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::path::Path;

/// SIGKILL any process whose environment names a `HIVE_AGENT_ID`.
///
/// This runs between restoration and the first spawn. Restored agents have
/// no live process by definition, so every process still claiming an agent
/// id belongs to a previous daemon incarnation; the session resumes from
/// disk, the process is unowned.
pub(crate) fn kill_orphan_agent_processes(supervisor: &Supervisor) {
    // Touch the supervisor only to make the ordering requirement explicit:
    // restoration must have happened before the sweep.
    let restored = supervisor.list().len();
    let self_pid = std::process::id() as i32;

    let Ok(entries) = std::fs::read_dir("/proc") else {
        return;
    };
    let mut killed = 0u32;
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<i32>().ok()) else {
            continue;
        };
        if pid == self_pid {
            continue;
        }
        let Some(agent_id) = agent_id_from_environ(&entry.path()) else {
            continue;
        };
        tracing::warn!(pid, agent_id, "killing orphaned agent process");
        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
        killed += 1;
    }
    if killed > 0 {
        tracing::info!(killed, restored, "orphan process sweep complete");
    }
}

/// Read `HIVE_AGENT_ID` out of `/proc/<pid>/environ`.
fn agent_id_from_environ(proc_dir: &Path) -> Option<String> {
    let environ = std::fs::read(proc_dir.join("environ")).ok()?;
    for chunk in environ.split(|b| *b == 0) {
        let var = std::str::from_utf8(chunk).ok()?;
        if let Some(value) = var.strip_prefix("HIVE_AGENT_ID=") {
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}

/// Delete workspace directories that no live agent claims.
pub(crate) fn prune_stale_workspaces(supervisor: &Supervisor) {
    let config = supervisor.config();
    let claimed: HashSet<std::path::PathBuf> =
        supervisor.list().into_iter().map(|a| a.workspace_dir).collect();

    let Ok(entries) = std::fs::read_dir(&config.workspaces_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() || claimed.contains(&path) {
            continue;
        }
        tracing::info!(path = %path.display(), "pruning stale workspace");
        if let Err(e) = std::fs::remove_dir_all(&path) {
            tracing::warn!(path = %path.display(), error = %e, "stale workspace prune failed");
        }
    }
}

#[cfg(test)]
#[path = "sweep_tests.rs"]
mod tests;

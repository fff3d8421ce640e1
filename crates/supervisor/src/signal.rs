// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-group signalling.
//!
//! Children are spawned detached in their own process group, so signals go
//! to `-pid` and reach any shells or helpers the agent started.

use hive_core::limits::{KILL_ESCALATION, LIFECYCLE_KILL_TIMEOUT};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use tokio::sync::watch;

pub(crate) fn term_group(pgid: i32) {
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGTERM) {
        tracing::debug!(pgid, error = %e, "SIGTERM to group failed");
    }
}

pub(crate) fn kill_group(pgid: i32) {
    if killpg(Pid::from_raw(pgid), Signal::SIGKILL).is_err() {
        // Group may be gone; fall back to the lead pid.
        let _ = kill(Pid::from_raw(pgid), Signal::SIGKILL);
    }
}

pub(crate) fn stop_group(pgid: i32) {
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGSTOP) {
        tracing::warn!(pgid, error = %e, "SIGSTOP to group failed");
    }
}

pub(crate) fn cont_group(pgid: i32) {
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGCONT) {
        tracing::warn!(pgid, error = %e, "SIGCONT to group failed");
    }
}

/// SIGKILL one pid, ignoring errors. Used by the emergency sweep.
pub(crate) fn kill_pid(pid: i32) {
    let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
}

/// Emergency sweep: SIGKILL every visible process except init, this
/// process, and its direct parent. Catches shells, git, and http clients
/// agents spawned outside their tracked process groups. Only meaningful
/// inside a dedicated container.
pub(crate) fn sweep_all_processes() {
    let self_pid = std::process::id() as i32;
    let parent_pid = std::os::unix::process::parent_id() as i32;
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return;
    };
    let mut swept = 0u32;
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<i32>().ok()) else {
            continue;
        };
        if pid <= 1 || pid == self_pid || pid == parent_pid {
            continue;
        }
        kill_pid(pid);
        swept += 1;
    }
    tracing::warn!(swept, "emergency process sweep complete");
}

/// Wait for the exit channel to report a code.
async fn wait_exit(rx: &mut watch::Receiver<Option<i32>>) {
    loop {
        if rx.borrow().is_some() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Graceful group termination: SIGTERM, escalate to SIGKILL after the
/// grace period, and bound the whole wait by the lifecycle safety timeout
/// so a wedged child cannot block the next spawn forever.
pub(crate) async fn term_then_kill(pgid: i32, exit_rx: Option<watch::Receiver<Option<i32>>>) {
    term_group(pgid);

    let Some(mut rx) = exit_rx else {
        // No exit channel (restored agent): escalate blind after the grace.
        tokio::time::sleep(KILL_ESCALATION).await;
        kill_group(pgid);
        return;
    };

    if tokio::time::timeout(KILL_ESCALATION, wait_exit(&mut rx)).await.is_ok() {
        return;
    }
    tracing::warn!(pgid, "SIGTERM grace expired, escalating to SIGKILL");
    kill_group(pgid);

    let remainder = LIFECYCLE_KILL_TIMEOUT.saturating_sub(KILL_ESCALATION);
    if tokio::time::timeout(remainder, wait_exit(&mut rx)).await.is_err() {
        tracing::warn!(pgid, "child did not close within the safety timeout");
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted agent record and its status machine.
//!
//! An `Agent` is the durable identity of one supervised child process. The
//! live process handle and parsing state live in the supervisor's in-memory
//! map; this record is what survives a restart. Field names serialize in
//! camelCase for compatibility with existing state files and tooling.

use crate::id::AgentId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a supervised agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Spawned, no output observed yet.
    Starting,
    /// Child process producing output.
    Running,
    /// Last turn exited cleanly; ready for the next prompt.
    Idle,
    /// Revived from disk after a restart; process is gone, session remains.
    Restored,
    /// Restored into an unknown process state (terminal restart marker).
    Disconnected,
    /// Running but silent past the stall timeout.
    Stalled,
    /// SIGSTOP'd by the operator.
    Paused,
    /// Old process being torn down ahead of a respawn.
    Killing,
    /// Teardown in progress; the record is about to disappear.
    Destroying,
    /// Terminal failure.
    Error,
}

impl AgentStatus {
    /// Statuses from which a new prompt may be delivered.
    pub fn is_deliverable(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Restored | AgentStatus::Stalled)
    }

    /// Statuses the watchdog leaves alone.
    pub fn is_watchdog_exempt(&self) -> bool {
        matches!(
            self,
            AgentStatus::Destroying
                | AgentStatus::Killing
                | AgentStatus::Paused
                | AgentStatus::Disconnected
        )
    }

    /// State-file writes for these transitions happen immediately rather
    /// than on the debounce timer.
    pub fn is_meaningful_transition(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Running | AgentStatus::Error)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Starting => "starting",
            AgentStatus::Running => "running",
            AgentStatus::Idle => "idle",
            AgentStatus::Restored => "restored",
            AgentStatus::Disconnected => "disconnected",
            AgentStatus::Stalled => "stalled",
            AgentStatus::Paused => "paused",
            AgentStatus::Killing => "killing",
            AgentStatus::Destroying => "destroying",
            AgentStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Accumulated token and cost totals for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    /// Latest full-context input size (latest-value-wins from `result`).
    pub tokens_in: u64,
    /// Cumulative output tokens.
    pub tokens_out: u64,
    /// Cumulative estimated cost in USD.
    pub cost_usd: f64,
    /// Completed turns.
    pub turns: u32,
}

/// Durable record of one supervised agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub created_at: u64,
    /// Spawn-tree depth: `(parent.depth ?? 0) + 1`, fixed at creation.
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AgentId>,
    pub workspace_dir: PathBuf,
    pub model: String,
    pub status: AgentStatus,
    pub last_activity: u64,
    /// Captured exactly once from the first `system`/`init` stream event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub usage: UsageTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub dangerously_skip_permissions: bool,
}

impl Agent {
    /// Record observed activity at `now_ms`.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity = now_ms;
    }

    /// Set the session id; later captures are ignored (monotonic).
    pub fn capture_session(&mut self, session_id: &str) -> bool {
        if self.session_id.is_some() {
            return false;
        }
        self.session_id = Some(session_id.to_string());
        true
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task graph data model.
//!
//! Tasks form a DAG through `depends_on`. Mutations use optimistic
//! concurrency: every successful mutation increments `version`, and callers
//! present the version they observed.

use crate::id::{AgentId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Priority scale: 0 = unspecified, 1 = urgent .. 4 = low.
///
/// `0` sorts with the lowest selection priority: an unprioritized task is
/// the least likely to be picked.
pub const PRIORITY_NONE: u8 = 0;
pub const PRIORITY_MAX: u8 = 4;

/// Status of a task in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One task in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: u8,
    pub status: TaskStatus,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    pub max_retries: u32,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Optimistic concurrency counter; strictly increases on mutation.
    pub version: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Task {
    /// Sort key for assignment: urgent (1) first, unprioritized (0) last,
    /// ties broken by age.
    pub fn selection_rank(&self) -> (u8, u64) {
        let rank = if self.priority == PRIORITY_NONE { PRIORITY_MAX + 1 } else { self.priority };
        (rank, self.created_at)
    }

    /// Whether every required capability appears in `capabilities`.
    pub fn capabilities_satisfied_by(&self, capabilities: &[String]) -> bool {
        self.required_capabilities.iter().all(|req| capabilities.iter().any(|c| c == req))
    }
}

/// Per-agent record of what an agent can do and how it has fared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityProfile {
    /// Capability tag → confidence in [0, 1].
    #[serde(default)]
    pub capabilities: HashMap<String, f64>,
    /// Capability tag → historical success rate in [0, 1].
    #[serde(default)]
    pub success_rate: HashMap<String, f64>,
    #[serde(default)]
    pub total_completed: u32,
    #[serde(default)]
    pub total_failed: u32,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Creation and query inputs.

use hive_core::{AgentId, TaskId, TaskStatus};

/// Longest accepted title.
pub const MAX_TITLE_LEN: usize = 500;
/// Longest accepted free-text field (description, input, expected output,
/// acceptance criteria).
pub const MAX_TEXT_LEN: usize = 10_000;
/// Most dependencies per task.
pub const MAX_DEPS: usize = 50;
/// Most required capabilities per task.
pub const MAX_REQUIRED_CAPS: usize = 20;
/// Default retry budget.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Input to [`crate::TaskGraph::create_task`].
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pub title: String,
    pub description: Option<String>,
    /// 0 = unspecified, 1 = urgent .. 4 = low.
    pub priority: u8,
    pub depends_on: Vec<TaskId>,
    pub parent_task_id: Option<TaskId>,
    pub required_capabilities: Vec<String>,
    pub input: Option<String>,
    pub expected_output: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub max_retries: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl TaskSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, deps: Vec<TaskId>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn requires(mut self, capabilities: Vec<String>) -> Self {
        self.required_capabilities = capabilities;
        self
    }
}

/// Filter for [`crate::TaskGraph::query_tasks`].
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub owner_agent_id: Option<AgentId>,
    pub parent_task_id: Option<TaskId>,
    /// Only tasks whose dependencies are all completed.
    pub unblocked: bool,
    /// Only tasks with no owner.
    pub unowned: bool,
    pub required_capability: Option<String>,
    pub limit: Option<usize>,
}

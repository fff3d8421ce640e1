// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixtures shared by other crates' tests: a controllable clock and
//! record builders.

use crate::agent::{Agent, AgentStatus, UsageTotals};
use crate::clock::Clock;
use crate::id::{AgentId, TaskId};
use crate::task::{Task, TaskStatus};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Controllable clock for TTL, dedup-window, and watchdog tests.
///
/// Starts at an arbitrary fixed epoch; clones share the same time.
#[derive(Clone)]
pub struct FakeClock {
    epoch_ms: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { epoch_ms: Arc::new(Mutex::new(1_000_000)) }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.epoch_ms.lock() += duration.as_millis() as u64;
    }

    /// Set the epoch milliseconds value.
    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }
}

/// Build an agent record with sensible defaults.
pub fn agent_fixture(id: &str) -> Agent {
    Agent {
        id: AgentId::new(id),
        name: format!("agent-{id}"),
        created_at: 1_000_000,
        depth: 1,
        parent_id: None,
        workspace_dir: PathBuf::from(format!("/tmp/hive-test/{id}")),
        model: "claude-sonnet-4-5".into(),
        status: AgentStatus::Starting,
        last_activity: 1_000_000,
        session_id: None,
        usage: UsageTotals::default(),
        role: None,
        capabilities: None,
        dangerously_skip_permissions: false,
    }
}

/// Build a pending task with sensible defaults.
pub fn task_fixture(id: &str, priority: u8) -> Task {
    Task {
        id: TaskId::new(id),
        title: format!("task {id}"),
        description: None,
        priority,
        status: TaskStatus::Pending,
        depends_on: vec![],
        owner_agent_id: None,
        parent_task_id: None,
        required_capabilities: vec![],
        input: None,
        expected_output: None,
        acceptance_criteria: None,
        max_retries: 2,
        retry_count: 0,
        timeout_ms: None,
        version: 1,
        created_at: 1_000_000,
        updated_at: 1_000_000,
    }
}

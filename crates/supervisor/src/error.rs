// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hive_core::{AgentId, AgentStatus};
use thiserror::Error;

/// Typed rejections surfaced to the host. Preconditions reject without any
/// state change.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("agent not found: {0}")]
    NotFound(AgentId),
    #[error("agent {0} has no session to resume")]
    NoSession(AgentId),
    #[error("kill switch active")]
    KillSwitchActive,
    #[error("maximum agents reached ({0})")]
    MaxAgentsReached(usize),
    #[error("maximum agent depth exceeded (max {max})")]
    MaxDepthExceeded { max: u32 },
    #[error("maximum children per agent exceeded for {parent} (max {max})")]
    MaxChildrenExceeded { parent: AgentId, max: usize },
    #[error("Agent {name:?} was already created recently ({existing})")]
    DuplicateAgent { name: String, existing: AgentId },
    #[error("kill-switch tombstone present, refusing restore")]
    TombstonePresent,
    #[error("agent {id} is {status}")]
    AgentBusy { id: AgentId, status: AgentStatus },
    #[error("agent {0} has no live process")]
    NoProcess(AgentId),
    #[error("spawn failed for {id}: {source}")]
    SpawnFailed {
        id: AgentId,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] hive_store::StoreError),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inter-agent message types.

use crate::id::{AgentId, MessageId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of an inter-agent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Orchestrator task assignment.
    Task,
    /// Task outcome reported back.
    Result,
    /// Peer question expecting an answer.
    Question,
    /// Informational note.
    Info,
    /// Status chatter; never auto-delivered.
    Status,
    /// Preempts the recipient's current turn.
    Interrupt,
}

impl MessageType {
    /// Status messages are visible via query but are not pushed into an
    /// agent's next turn.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, MessageType::Status)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageType::Task => "task",
            MessageType::Result => "result",
            MessageType::Question => "question",
            MessageType::Info => "info",
            MessageType::Status => "status",
            MessageType::Interrupt => "interrupt",
        };
        write!(f, "{s}")
    }
}

/// A message on the bus. Immutable once posted, except for read tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub from: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    /// Absent means broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<AgentId>,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Roles excluded from seeing a broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_roles: Option<HashSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: u64,
    #[serde(default)]
    pub read_by: HashSet<AgentId>,
}

impl Message {
    /// Whether this message is visible to `agent` acting under `role`.
    ///
    /// A targeted message is visible only to its addressee. A broadcast is
    /// visible to everyone whose role is not excluded.
    pub fn visible_to(&self, agent: &AgentId, role: Option<&str>) -> bool {
        match &self.to {
            Some(to) => to == agent,
            None => match (&self.exclude_roles, role) {
                (Some(excluded), Some(role)) => !excluded.contains(role),
                _ => true,
            },
        }
    }

    /// Whether `agent` has read this message.
    pub fn is_read_by(&self, agent: &AgentId) -> bool {
        self.read_by.contains(agent)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

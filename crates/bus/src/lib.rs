// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory message bus with filtered fan-out and read tracking.
//!
//! A bounded FIFO of typed messages. Posts are totally ordered; every
//! subscriber observes the same order through its own channel. Messages are
//! best-effort, at-most-once: there is no durable log, and the oldest
//! messages drop when the cap is reached.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use hive_core::limits::MAX_MESSAGES;
use hive_core::{AgentId, Message, MessageId, MessageType};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Input to [`MessageBus::post`].
#[derive(Debug, Clone)]
pub struct PostSpec {
    pub from: AgentId,
    pub from_name: Option<String>,
    /// Absent means broadcast.
    pub to: Option<AgentId>,
    pub kind: MessageType,
    pub content: String,
    pub channel: Option<String>,
    pub exclude_roles: Option<HashSet<String>>,
    pub metadata: Option<serde_json::Value>,
}

impl PostSpec {
    pub fn new(from: impl Into<AgentId>, kind: MessageType, content: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            from_name: None,
            to: None,
            kind,
            content: content.into(),
            channel: None,
            exclude_roles: None,
            metadata: None,
        }
    }

    pub fn to(mut self, to: impl Into<AgentId>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }
}

/// Filter for [`MessageBus::query`].
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    /// Restrict to messages visible to this addressee (targeted at them, or
    /// broadcasts their role is not excluded from).
    pub to: Option<AgentId>,
    pub from: Option<AgentId>,
    pub kind: Option<MessageType>,
    pub channel: Option<String>,
    /// Only messages not yet read by this agent.
    pub unread_by: Option<AgentId>,
    /// Only messages created at or after this epoch-ms timestamp.
    pub since: Option<u64>,
    /// Role used for broadcast exclusion checks, paired with `to`.
    pub agent_role: Option<String>,
    pub limit: Option<usize>,
}

/// The in-memory bus.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<Mutex<BusInner>>,
    now_ms: Arc<dyn Fn() -> u64 + Send + Sync>,
}

struct BusInner {
    messages: VecDeque<Message>,
    subscribers: Vec<mpsc::UnboundedSender<Message>>,
}

impl MessageBus {
    pub fn new(now_ms: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                messages: VecDeque::new(),
                subscribers: Vec::new(),
            })),
            now_ms: Arc::new(now_ms),
        }
    }

    /// Append a message, enforce the FIFO cap, and fan out to subscribers.
    pub fn post(&self, spec: PostSpec) -> Message {
        let message = Message {
            id: MessageId::generate(),
            from: spec.from,
            from_name: spec.from_name,
            to: spec.to,
            kind: spec.kind,
            content: spec.content,
            channel: spec.channel,
            exclude_roles: spec.exclude_roles,
            metadata: spec.metadata,
            created_at: (self.now_ms)(),
            read_by: HashSet::new(),
        };

        let mut inner = self.inner.lock();
        inner.messages.push_back(message.clone());
        while inner.messages.len() > MAX_MESSAGES {
            inner.messages.pop_front();
        }
        // Fan out; drop subscribers whose receiver is gone. Channel sends
        // cannot panic, so one subscriber can never poison the bus.
        inner.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        message
    }

    /// Query messages, oldest first.
    pub fn query(&self, query: &MessageQuery) -> Vec<Message> {
        let inner = self.inner.lock();
        let mut out: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| Self::matches(m, query))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            let excess = out.len().saturating_sub(limit);
            out.drain(..excess);
        }
        out
    }

    fn matches(message: &Message, query: &MessageQuery) -> bool {
        if let Some(to) = &query.to {
            if !message.visible_to(to, query.agent_role.as_deref()) {
                return false;
            }
        }
        if let Some(from) = &query.from {
            if &message.from != from {
                return false;
            }
        }
        if let Some(kind) = query.kind {
            if message.kind != kind {
                return false;
            }
        }
        if let Some(channel) = &query.channel {
            if message.channel.as_deref() != Some(channel.as_str()) {
                return false;
            }
        }
        if let Some(reader) = &query.unread_by {
            if message.is_read_by(reader) {
                return false;
            }
        }
        if let Some(since) = query.since {
            if message.created_at < since {
                return false;
            }
        }
        true
    }

    /// Mark one message read by an agent. Idempotent.
    pub fn mark_read(&self, id: &MessageId, agent: &AgentId) -> bool {
        let mut inner = self.inner.lock();
        match inner.messages.iter_mut().find(|m| &m.id == id) {
            Some(message) => {
                message.read_by.insert(agent.clone());
                true
            }
            None => false,
        }
    }

    /// Mark every message visible to an agent as read.
    pub fn mark_all_read(&self, agent: &AgentId, role: Option<&str>) -> usize {
        let mut inner = self.inner.lock();
        let mut count = 0;
        for message in inner.messages.iter_mut() {
            if message.visible_to(agent, role) && message.read_by.insert(agent.clone()) {
                count += 1;
            }
        }
        count
    }

    /// Count unread messages visible to an agent.
    pub fn unread_count(&self, agent: &AgentId, role: Option<&str>) -> usize {
        let inner = self.inner.lock();
        inner
            .messages
            .iter()
            .filter(|m| m.visible_to(agent, role) && !m.is_read_by(agent))
            .count()
    }

    pub fn delete_message(&self, id: &MessageId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.messages.len();
        inner.messages.retain(|m| &m.id != id);
        inner.messages.len() < before
    }

    /// Remove every message sent by or addressed to an agent.
    pub fn cleanup_for_agent(&self, agent: &AgentId) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.messages.len();
        inner.messages.retain(|m| &m.from != agent && m.to.as_ref() != Some(agent));
        before - inner.messages.len()
    }

    /// Subscribe to every subsequent post. Dropping the receiver
    /// unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;

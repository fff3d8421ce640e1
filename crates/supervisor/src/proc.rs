// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory process state for one agent.
//!
//! Everything here lives inside the supervisor's mutex; none of it is
//! persisted. The ring buffer serves reconnect replays without touching
//! disk; batches accumulate between 16 ms flushes.

use hive_core::limits::{MAX_SEEN_MESSAGE_IDS, RING_CAPACITY, SEEN_PRUNE_TO};
use hive_core::StreamEvent;
use indexmap::IndexSet;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};

/// Fixed-size circular event cache with a monotonic total counter.
pub(crate) struct EventRing {
    events: Vec<StreamEvent>,
    total: u64,
}

impl EventRing {
    pub fn new() -> Self {
        Self { events: Vec::new(), total: 0 }
    }

    pub fn push(&mut self, event: StreamEvent) {
        if self.events.len() < RING_CAPACITY {
            self.events.push(event);
        } else {
            let slot = (self.total % RING_CAPACITY as u64) as usize;
            self.events[slot] = event;
        }
        self.total += 1;
    }

    /// Events in arrival order. When wrapped, the oldest retained event
    /// starts at `total % capacity`.
    pub fn snapshot(&self) -> Vec<StreamEvent> {
        if self.events.len() < RING_CAPACITY {
            return self.events.clone();
        }
        let split = (self.total % RING_CAPACITY as u64) as usize;
        let mut out = Vec::with_capacity(RING_CAPACITY);
        out.extend_from_slice(&self.events[split..]);
        out.extend_from_slice(&self.events[..split]);
        out
    }

    /// Seed the ring from a disk replay (newest events win when the replay
    /// exceeds capacity).
    pub fn hydrate(&mut self, events: &[StreamEvent]) {
        for event in events.iter().skip(events.len().saturating_sub(RING_CAPACITY)) {
            self.push(event.clone());
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Live parsing, batching, and subscription state for one agent.
pub(crate) struct AgentProc {
    /// Partial stdout tail awaiting a newline.
    pub line_buffer: String,
    /// Set when the line buffer crossed the backpressure threshold; the
    /// reader stops pulling until the batch processor drains it.
    pub paused: bool,
    /// At most one batch processor in flight per agent.
    pub batch_scheduled: bool,
    /// Signals the paused reader that the buffer drained.
    pub drained: Arc<Notify>,
    pub ring: EventRing,
    pub listeners: HashMap<u64, mpsc::UnboundedSender<StreamEvent>>,
    next_listener_id: u64,
    /// Assistant message ids already counted toward usage.
    pub seen_message_ids: IndexSet<String>,
    /// Sanitized JSONL lines awaiting the durable write queue.
    pub persist_batch: Vec<String>,
    /// Sanitized events awaiting listener fan-out.
    pub listener_batch: Vec<StreamEvent>,
    pub flush_armed: bool,
    pub stall_count: u32,
    /// Bumps whenever handlers are detached; stale tasks compare and no-op.
    pub generation: u64,
    /// Child process group id (== child pid, spawned with process_group(0)).
    pub pgid: Option<i32>,
    /// Exit observation channel for the current child.
    pub exit_rx: Option<watch::Receiver<Option<i32>>>,
}

impl AgentProc {
    pub fn new() -> Self {
        Self {
            line_buffer: String::new(),
            paused: false,
            batch_scheduled: false,
            drained: Arc::new(Notify::new()),
            ring: EventRing::new(),
            listeners: HashMap::new(),
            next_listener_id: 0,
            seen_message_ids: IndexSet::new(),
            persist_batch: Vec::new(),
            listener_batch: Vec::new(),
            flush_armed: false,
            stall_count: 0,
            generation: 0,
            pgid: None,
            exit_rx: None,
        }
    }

    /// Record a seen assistant message id, pruning the oldest half when the
    /// set overflows. Returns false when the id was already present.
    pub fn note_seen(&mut self, message_id: String) -> bool {
        if self.seen_message_ids.contains(&message_id) {
            return false;
        }
        if self.seen_message_ids.len() >= MAX_SEEN_MESSAGE_IDS {
            let keep: IndexSet<String> = self
                .seen_message_ids
                .iter()
                .skip(self.seen_message_ids.len() - SEEN_PRUNE_TO)
                .cloned()
                .collect();
            self.seen_message_ids = keep;
        }
        self.seen_message_ids.insert(message_id);
        true
    }

    pub fn add_listener(&mut self, tx: mpsc::UnboundedSender<StreamEvent>) -> u64 {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.insert(id, tx);
        id
    }

    /// Exit code of the current child, if it has exited.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_rx.as_ref().and_then(|rx| *rx.borrow())
    }

    /// Whether a child is attached and still running.
    pub fn process_alive(&self) -> bool {
        self.pgid.is_some() && self.exit_rx.as_ref().is_some_and(|rx| rx.borrow().is_none())
    }

    /// Detach handlers: stale reader/exit tasks see the bumped generation
    /// and stop touching state. Returns the old process handle parts.
    pub fn detach(&mut self) -> (Option<i32>, Option<watch::Receiver<Option<i32>>>) {
        self.generation += 1;
        (self.pgid.take(), self.exit_rx.take())
    }
}

#[cfg(test)]
#[path = "proc_tests.rs"]
mod tests;

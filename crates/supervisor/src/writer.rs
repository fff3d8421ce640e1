// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent serialized event-log write queue.
//!
//! One background task per agent drains an ordered channel, so appends for
//! a given agent never interleave and persistence order matches arrival
//! order. Write failures are absorbed with a warning.

use hive_core::AgentId;
use hive_store::EventLog;
use tokio::sync::mpsc;

pub(crate) enum WriterOp {
    /// Append sanitized JSONL lines, then truncate if the log has grown
    /// past the threshold.
    Append(Vec<String>),
    /// Delete the log and stop the queue (agent destroyed).
    Remove,
    /// Stop the queue, leaving the log on disk (graceful dispose).
    Shutdown,
}

/// Spawn the write queue for one agent.
pub(crate) fn spawn_writer(log: EventLog, id: AgentId) -> mpsc::UnboundedSender<WriterOp> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            match op {
                WriterOp::Append(lines) => {
                    if let Err(e) = log.append(&id, &lines) {
                        tracing::warn!(agent_id = %id, error = %e, "event log append failed");
                        continue;
                    }
                    if let Err(e) = log.maybe_truncate(&id) {
                        tracing::warn!(agent_id = %id, error = %e, "event log truncation failed");
                    }
                }
                WriterOp::Remove => {
                    log.remove(&id);
                    break;
                }
                WriterOp::Shutdown => break,
            }
        }
    });
    tx
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;

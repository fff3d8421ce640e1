// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream ingestion: the stdout hot path.
//!
//! The reader appends raw chunks to the line buffer and nothing else; a
//! deferred batch processor (at most one in flight per agent) splits lines,
//! parses events, and yields every 50 lines so one agent's burst cannot
//! starve the others. When the buffer crosses 1 MiB the reader parks until
//! the processor drains it.
//!
//! Every mutation here checks the agent's handler generation; a detached
//! child's tasks see a stale generation and stop touching state.

use crate::pricing;
use crate::writer::WriterOp;
use hive_core::limits::{FLUSH_INTERVAL, LINES_PER_BATCH, MAX_LINE_BUFFER};
use hive_core::{sanitize_line, AgentId, AgentStatus, Clock, StreamEvent};

impl<C: Clock> crate::supervisor::Supervisor<C> {
    /// Append a stdout chunk. Called only by the reader task; suspends the
    /// caller while backpressure is engaged.
    pub(crate) async fn ingest_chunk(&self, id: &AgentId, generation: u64, chunk: &str) {
        let (schedule, wait_drained) = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.agents.get_mut(id) else {
                return;
            };
            if entry.proc.generation != generation {
                return;
            }
            entry.proc.line_buffer.push_str(chunk);
            if entry.proc.line_buffer.len() > MAX_LINE_BUFFER {
                entry.proc.paused = true;
            }
            let schedule = !entry.proc.batch_scheduled;
            if schedule {
                entry.proc.batch_scheduled = true;
            }
            let wait = entry.proc.paused.then(|| entry.proc.drained.clone());
            (schedule, wait)
        };

        if schedule {
            let sup = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                sup.process_line_batches(&id, generation).await;
            });
        }

        if let Some(drained) = wait_drained {
            loop {
                let notified = drained.notified();
                tokio::pin!(notified);
                // Register before re-checking, or a notify between the
                // check and the await is lost.
                notified.as_mut().enable();
                {
                    let inner = self.inner.lock();
                    match inner.agents.get(id) {
                        Some(entry)
                            if entry.proc.generation == generation && entry.proc.paused => {}
                        _ => break,
                    }
                }
                notified.await;
            }
        }
    }

    /// Drain the line buffer in bounded batches, yielding between them.
    pub(crate) async fn process_line_batches(&self, id: &AgentId, generation: u64) {
        loop {
            let lines = {
                let mut inner = self.inner.lock();
                let Some(entry) = inner.agents.get_mut(id) else {
                    return;
                };
                if entry.proc.generation != generation {
                    entry.proc.batch_scheduled = false;
                    return;
                }
                let mut lines: Vec<String> = Vec::new();
                while lines.len() < LINES_PER_BATCH {
                    let Some(pos) = entry.proc.line_buffer.find('\n') else {
                        break;
                    };
                    lines.push(entry.proc.line_buffer.drain(..=pos).collect());
                }
                if lines.is_empty() {
                    // Fully drained (only a partial tail may remain).
                    entry.proc.batch_scheduled = false;
                    if entry.proc.paused {
                        entry.proc.paused = false;
                        entry.proc.drained.notify_waiters();
                    }
                    return;
                }
                lines
            };

            for line in &lines {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if trimmed.trim().is_empty() {
                    continue;
                }
                self.record_event(id, generation, StreamEvent::parse_line(trimmed));
            }
            tokio::task::yield_now().await;
        }
    }

    /// Per-event handling: session capture, status recovery, usage
    /// accounting, sanitization, batching.
    pub(crate) fn record_event(&self, id: &AgentId, generation: u64, event: StreamEvent) {
        let now = self.clock.epoch_ms();
        let mut meaningful = false;

        let (agent, arm_flush) = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.agents.get_mut(id) else {
                return;
            };
            if entry.proc.generation != generation {
                return;
            }

            // Session id is captured exactly once and never changes.
            if let Some(session) = event.init_session_id() {
                if entry.agent.capture_session(session) {
                    meaningful = true;
                    tracing::info!(agent_id = %id, session_id = session, "session captured");
                }
            }

            // First child output flips starting to running. Synthetic
            // prompt records don't count; they precede the spawn.
            if entry.agent.status == AgentStatus::Starting
                && !matches!(event, StreamEvent::UserPrompt { .. })
            {
                entry.agent.status = AgentStatus::Running;
                meaningful = true;
            }

            if let StreamEvent::Assistant { message, .. } = &event {
                if entry.agent.status == AgentStatus::Stalled
                    && message.content.iter().any(|b| b.is_progress())
                {
                    entry.proc.stall_count = 0;
                    entry.agent.status = AgentStatus::Running;
                    meaningful = true;
                    tracing::info!(agent_id = %id, "stall recovered");
                }
                if let Some(message_id) = &message.id {
                    if entry.proc.note_seen(message_id.clone()) {
                        if let Some(usage) = &message.usage {
                            entry.agent.usage.tokens_in += usage.tokens_in();
                            entry.agent.usage.tokens_out += usage.output_tokens;
                            entry.agent.usage.cost_usd +=
                                pricing::estimate_cost(&entry.agent.model, usage);
                        }
                    }
                }
            }

            if let StreamEvent::Result { usage, total_cost_usd, .. } = &event {
                if let Some(usage) = usage {
                    // The CLI reports the full context each turn:
                    // latest-value-wins for input, additive for output.
                    entry.agent.usage.tokens_in = usage.tokens_in();
                    entry.agent.usage.tokens_out += usage.output_tokens;
                }
                if let Some(cost) = total_cost_usd {
                    entry.agent.usage.cost_usd += cost;
                }
                entry.agent.usage.turns += 1;
            }

            entry.agent.touch(now);

            let line = sanitize_line(&event.to_json_line());
            let sanitized = StreamEvent::parse_line(&line);
            entry.proc.persist_batch.push(line);
            entry.proc.ring.push(sanitized.clone());
            entry.proc.listener_batch.push(sanitized);

            let arm = !entry.proc.flush_armed;
            entry.proc.flush_armed = true;
            (entry.agent.clone(), arm)
        };

        self.state.save(&agent, meaningful);

        if arm_flush {
            let sup = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(FLUSH_INTERVAL).await;
                sup.flush_event_batch(&id);
            });
        }
    }

    /// Flush both batches: persist lines go to the per-agent write queue,
    /// listener events fan out in order. Synchronous under the lock, so
    /// concurrent flushes cannot reorder anyone's stream.
    pub(crate) fn flush_event_batch(&self, id: &AgentId) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.agents.get_mut(id) else {
            return;
        };
        entry.proc.flush_armed = false;

        let lines = std::mem::take(&mut entry.proc.persist_batch);
        if !lines.is_empty() {
            let _ = entry.writer_tx.send(WriterOp::Append(lines));
        }

        let events = std::mem::take(&mut entry.proc.listener_batch);
        if !events.is_empty() {
            entry
                .proc
                .listeners
                .retain(|_, tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
        }
    }

    /// Process close: flush the partial tail, emit `done`,
    /// flush so listeners see final events first, then transition status.
    pub(crate) async fn handle_exit(&self, id: &AgentId, generation: u64, exit_code: i32) {
        enum Drain {
            Done,
            Claimed,
            InFlight,
        }

        // EOF means no new chunks arrive, but a batch processor may still
        // be working through queued lines. Let it finish (or finish for
        // it) so the tail keeps stream order.
        loop {
            let state = {
                let mut inner = self.inner.lock();
                let Some(entry) = inner.agents.get_mut(id) else {
                    return;
                };
                if entry.proc.generation != generation {
                    return;
                }
                if entry.proc.batch_scheduled {
                    Drain::InFlight
                } else if entry.proc.line_buffer.contains('\n') {
                    entry.proc.batch_scheduled = true;
                    Drain::Claimed
                } else {
                    Drain::Done
                }
            };
            match state {
                Drain::Done => break,
                Drain::Claimed => self.process_line_batches(id, generation).await,
                Drain::InFlight => tokio::time::sleep(std::time::Duration::from_millis(2)).await,
            }
        }

        let leftover = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.agents.get_mut(id) else {
                return;
            };
            if entry.proc.generation != generation {
                return;
            }
            if entry.proc.paused {
                entry.proc.paused = false;
                entry.proc.drained.notify_waiters();
            }
            std::mem::take(&mut entry.proc.line_buffer)
        };

        let tail = leftover.trim();
        if !tail.is_empty() {
            self.record_event(id, generation, StreamEvent::parse_line(tail));
        }
        self.record_event(id, generation, StreamEvent::Done { exit_code });
        self.flush_event_batch(id);

        let transitioned = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.agents.get_mut(id) else {
                return;
            };
            if entry.proc.generation != generation {
                return;
            }
            entry.proc.pgid = None;
            entry.agent.status =
                if exit_code == 0 { AgentStatus::Idle } else { AgentStatus::Error };
            entry.agent.touch(self.clock.epoch_ms());
            entry.agent.clone()
        };
        self.state.save(&transitioned, true);
        tracing::info!(agent_id = %id, exit_code, status = %transitioned.status, "agent turn ended");

        if exit_code == 0 {
            self.notify_idle(id);
        }
    }

    /// Push an idle transition to every registered idle listener.
    pub(crate) fn notify_idle(&self, id: &AgentId) {
        let mut inner = self.inner.lock();
        inner.idle_listeners.retain(|tx| tx.send(id.clone()).is_ok());
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;

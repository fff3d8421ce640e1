// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchdog: dead-process, start-timeout, and stall detection.
//!
//! Runs every 30 s. Agents under a lifecycle operation or in an exempt
//! status are skipped. Stalled agents stay deliverable; three consecutive
//! stalls error the agent out.

use crate::supervisor::Supervisor;
use hive_core::limits::{MAX_STALLS, START_TIMEOUT, STALL_TIMEOUT, WATCHDOG_INTERVAL};
use hive_core::{AgentId, AgentStatus, Clock, StreamEvent};

enum Finding {
    /// Exit code observed but status never transitioned.
    DeadProcess { exit_code: i32 },
    StartTimeout,
    Stalled,
}

impl<C: Clock> Supervisor<C> {
    pub(crate) fn spawn_watchdog(&self) {
        let sup = self.clone();
        let cancel = self.cancel_token();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(WATCHDOG_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate tick is pointless at startup
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => sup.watchdog_tick(),
                }
            }
        });
    }

    /// One watchdog pass. Public for tests and for hosts that drive their
    /// own timers.
    pub fn watchdog_tick(&self) {
        let now = self.clock.epoch_ms();

        let findings: Vec<(AgentId, Finding)> = {
            let inner = self.inner.lock();
            inner
                .agents
                .iter()
                .filter_map(|(id, entry)| {
                    if entry.agent.status.is_watchdog_exempt() {
                        return None;
                    }
                    // Skip agents mid message/destroy.
                    let Ok(_probe) = entry.lifecycle.try_lock() else {
                        return None;
                    };
                    let quiet_since = entry.agent.last_activity;
                    match entry.agent.status {
                        AgentStatus::Running => {
                            if let Some(exit_code) = entry.proc.exit_code() {
                                return Some((id.clone(), Finding::DeadProcess { exit_code }));
                            }
                            if entry.proc.process_alive()
                                && self.clock.has_elapsed(quiet_since, STALL_TIMEOUT)
                            {
                                return Some((id.clone(), Finding::Stalled));
                            }
                            None
                        }
                        AgentStatus::Starting
                            if self.clock.has_elapsed(quiet_since, START_TIMEOUT) =>
                        {
                            Some((id.clone(), Finding::StartTimeout))
                        }
                        _ => None,
                    }
                })
                .collect()
        };

        for (id, finding) in findings {
            match finding {
                Finding::DeadProcess { exit_code } => self.reap_dead(&id, exit_code),
                Finding::StartTimeout => {
                    tracing::warn!(agent_id = %id, "start timeout, marking error");
                    self.mark_error(&id);
                }
                Finding::Stalled => self.mark_stalled(&id, now),
            }
        }
    }

    /// The close handler never ran (or was detached mid-transition); settle
    /// the status from the observed exit code.
    fn reap_dead(&self, id: &AgentId, exit_code: i32) {
        let agent = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.agents.get_mut(id) else {
                return;
            };
            if entry.agent.status != AgentStatus::Running {
                return;
            }
            entry.proc.pgid = None;
            entry.agent.status =
                if exit_code == 0 { AgentStatus::Idle } else { AgentStatus::Error };
            entry.agent.clone()
        };
        tracing::warn!(agent_id = %id, exit_code, status = %agent.status, "watchdog reaped dead process");
        self.state.save(&agent, true);
        if agent.status == AgentStatus::Idle {
            self.notify_idle(id);
        }
    }

    fn mark_stalled(&self, id: &AgentId, now: u64) {
        let (agent, stall_count, generation) = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.agents.get_mut(id) else {
                return;
            };
            entry.proc.stall_count += 1;
            let count = entry.proc.stall_count;
            entry.agent.status =
                if count >= MAX_STALLS { AgentStatus::Error } else { AgentStatus::Stalled };
            entry.agent.touch(now);
            (entry.agent.clone(), count, entry.proc.generation)
        };
        self.state.save(&agent, true);

        if agent.status == AgentStatus::Error {
            tracing::error!(agent_id = %id, stall_count, "repeated stalls, marking error");
            return;
        }

        tracing::warn!(agent_id = %id, stall_count, "agent stalled");
        self.record_event(
            id,
            generation,
            StreamEvent::watchdog(
                "No output for 10 minutes. The agent is marked stalled; send it a message to \
                 resume the session, or destroy it if it is wedged.",
            ),
        );
        // Stalled agents are deliverable: give auto-delivery a chance.
        self.notify_idle(id);
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;

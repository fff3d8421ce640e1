// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor: agent map, lifecycle operations, delivery gating.
//!
//! All shared state sits behind `inner`, a mutex never held across an
//! await. `message` and `destroy` serialize through a per-agent lifecycle
//! lock so kill-before-spawn ordering holds; the delivering set makes
//! `can_deliver` a single-flight gate per agent.

use crate::config::{SupervisorConfig, TokenSource};
use crate::error::SupervisorError;
use crate::proc::AgentProc;
use crate::signal;
use crate::spawn::{self, SpawnSpec};
use crate::workspace;
use crate::writer::{self, WriterOp};
use crate::{attachments, envs, pricing};
use hive_core::limits::{
    DEDUP_WINDOW, EMERGENCY_RESWEEP, STATE_FLUSH_INTERVAL, SWEEP_INTERVAL,
    TOKEN_REFRESH_INTERVAL,
};
use hive_core::{Agent, AgentId, AgentStatus, Clock, StreamEvent, SystemClock, UsageTotals};
use hive_store::{EventLog, KillSwitch, StateStore};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Input to [`Supervisor::create`].
#[derive(Debug, Clone)]
pub struct CreateSpec {
    pub name: String,
    pub prompt: String,
    pub model: Option<String>,
    pub parent_id: Option<AgentId>,
    pub role: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub dangerously_skip_permissions: bool,
    pub max_turns: Option<u32>,
    pub attachments: Vec<attachments::Attachment>,
}

impl CreateSpec {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            model: None,
            parent_id: None,
            role: None,
            capabilities: None,
            dangerously_skip_permissions: false,
            max_turns: None,
            attachments: Vec::new(),
        }
    }
}

/// Aggregate agent counts for hosts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub total: usize,
    pub by_status: HashMap<AgentStatus, usize>,
}

pub(crate) struct Entry {
    pub agent: Agent,
    pub proc: AgentProc,
    pub lifecycle: Arc<tokio::sync::Mutex<()>>,
    pub writer_tx: mpsc::UnboundedSender<WriterOp>,
}

pub(crate) struct Inner {
    pub agents: HashMap<AgentId, Entry>,
    pub delivering: HashSet<AgentId>,
    /// `(parent, name)` key → (created_at_ms, agent id); pruned on insert.
    pub recent_creates: HashMap<String, (u64, AgentId)>,
    pub idle_listeners: Vec<mpsc::UnboundedSender<AgentId>>,
}

/// The agent lifecycle supervisor.
#[derive(Clone)]
pub struct Supervisor<C: Clock = SystemClock> {
    pub(crate) inner: Arc<Mutex<Inner>>,
    pub(crate) config: Arc<SupervisorConfig>,
    pub(crate) state: StateStore,
    pub(crate) events: EventLog,
    pub(crate) kill: KillSwitch,
    pub(crate) tokens: Arc<TokenSource>,
    pub(crate) clock: C,
    pub(crate) cancel: CancellationToken,
}

impl Supervisor<SystemClock> {
    pub fn new(config: SupervisorConfig, kill: KillSwitch) -> Result<Self, SupervisorError> {
        Self::with_clock(config, kill, SystemClock)
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn with_clock(
        config: SupervisorConfig,
        kill: KillSwitch,
        clock: C,
    ) -> Result<Self, SupervisorError> {
        let state = StateStore::new(config.state_dir.clone())?;
        let events = EventLog::new(config.events_dir.clone())?;
        std::fs::create_dir_all(&config.workspaces_dir)?;
        std::fs::create_dir_all(&config.memory_dir)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                agents: HashMap::new(),
                delivering: HashSet::new(),
                recent_creates: HashMap::new(),
                idle_listeners: Vec::new(),
            })),
            config: Arc::new(config),
            state,
            events,
            kill,
            tokens: TokenSource::new(),
            clock,
            cancel: CancellationToken::new(),
        })
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn token_source(&self) -> Arc<TokenSource> {
        Arc::clone(&self.tokens)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // --- creation ---

    pub async fn create(&self, spec: CreateSpec) -> Result<Agent, SupervisorError> {
        if self.kill.is_killed() {
            return Err(SupervisorError::KillSwitchActive);
        }
        let now = self.clock.epoch_ms();
        let id = AgentId::generate();
        let model = pricing::resolve_model(spec.model.as_deref());

        let agent = {
            let mut inner = self.inner.lock();
            if inner.agents.len() >= self.config.limits.max_agents {
                return Err(SupervisorError::MaxAgentsReached(self.config.limits.max_agents));
            }

            let depth = match &spec.parent_id {
                Some(parent_id) => {
                    let parent = inner
                        .agents
                        .get(parent_id)
                        .ok_or_else(|| SupervisorError::NotFound(parent_id.clone()))?;
                    let depth = parent.agent.depth + 1;
                    if depth > self.config.limits.max_depth {
                        return Err(SupervisorError::MaxDepthExceeded {
                            max: self.config.limits.max_depth,
                        });
                    }
                    let siblings = inner
                        .agents
                        .values()
                        .filter(|e| e.agent.parent_id.as_ref() == Some(parent_id))
                        .count();
                    if siblings >= self.config.limits.max_children {
                        return Err(SupervisorError::MaxChildrenExceeded {
                            parent: parent_id.clone(),
                            max: self.config.limits.max_children,
                        });
                    }
                    depth
                }
                None => 1,
            };

            let key = dedup_key(spec.parent_id.as_ref(), &spec.name);
            inner.recent_creates.retain(|_, (ts, _)| !self.clock.has_elapsed(*ts, DEDUP_WINDOW));
            if let Some((_, existing)) = inner.recent_creates.get(&key) {
                return Err(SupervisorError::DuplicateAgent {
                    name: spec.name.clone(),
                    existing: existing.clone(),
                });
            }

            let agent = Agent {
                id: id.clone(),
                name: spec.name.clone(),
                created_at: now,
                depth,
                parent_id: spec.parent_id.clone(),
                workspace_dir: workspace::workspace_dir(&self.config, &spec.name, id.as_str()),
                model,
                status: AgentStatus::Starting,
                last_activity: now,
                session_id: None,
                usage: UsageTotals::default(),
                role: spec.role.clone(),
                capabilities: spec.capabilities.clone(),
                dangerously_skip_permissions: spec.dangerously_skip_permissions,
            };
            let writer_tx = writer::spawn_writer(self.events.clone(), id.clone());
            inner.agents.insert(
                id.clone(),
                Entry {
                    agent: agent.clone(),
                    proc: AgentProc::new(),
                    lifecycle: Arc::new(tokio::sync::Mutex::new(())),
                    writer_tx,
                },
            );
            inner.recent_creates.insert(key, (now, id.clone()));
            agent
        };

        if let Err(e) = workspace::ensure_workspace(
            &self.config,
            &agent.workspace_dir,
            &agent.name,
            id.as_str(),
            &self.tokens,
        ) {
            self.mark_error(&id);
            return Err(e.into());
        }

        let mut prompt = spec.prompt;
        match attachments::save_attachments(&agent.workspace_dir, &spec.attachments) {
            Ok(Some(prefix)) => prompt = format!("{prefix}{prompt}"),
            Ok(None) => {}
            Err(e) => tracing::warn!(agent_id = %id, error = %e, "attachment save failed"),
        }

        // Synthetic prompt record: the prompt never appears on stdout, but
        // reconnecting subscribers need to see how the turn started.
        self.record_event(&id, 0, StreamEvent::UserPrompt { text: prompt.clone() });
        self.state.save(&agent, true);

        let spawn_spec = SpawnSpec {
            model: agent.model.clone(),
            max_turns: spec.max_turns.unwrap_or(self.config.default_max_turns),
            resume: None,
            skip_permissions: agent.dangerously_skip_permissions,
            prompt,
        };
        let env = envs::build_env(&self.config, &agent, &self.tokens);
        match spawn::launch(&self.config.agent_bin, &spawn_spec, &env, &agent.workspace_dir) {
            Ok((child, pid)) => {
                let exit_rx = spawn::attach(self, &id, 0, child);
                {
                    let mut inner = self.inner.lock();
                    if let Some(entry) = inner.agents.get_mut(&id) {
                        entry.proc.pgid = Some(pid);
                        entry.proc.exit_rx = Some(exit_rx);
                    }
                }
                tracing::info!(agent_id = %id, name = %agent.name, model = %agent.model, pid, "agent spawned");
                Ok(agent)
            }
            Err(e) => {
                self.mark_error(&id);
                Err(SupervisorError::SpawnFailed { id, source: e })
            }
        }
    }

    // --- messaging: resume an existing session ---

    pub async fn message(
        &self,
        id: &AgentId,
        prompt: &str,
        max_turns: Option<u32>,
        target_session_id: Option<String>,
    ) -> Result<(), SupervisorError> {
        if self.kill.is_killed() {
            return Err(SupervisorError::KillSwitchActive);
        }
        let lifecycle = {
            let inner = self.inner.lock();
            let entry =
                inner.agents.get(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
            if matches!(entry.agent.status, AgentStatus::Killing | AgentStatus::Destroying) {
                return Err(SupervisorError::AgentBusy {
                    id: id.clone(),
                    status: entry.agent.status,
                });
            }
            if entry.agent.session_id.is_none() && target_session_id.is_none() {
                return Err(SupervisorError::NoSession(id.clone()));
            }
            Arc::clone(&entry.lifecycle)
        };

        // Serialize against concurrent message/destroy for this agent.
        let _guard = lifecycle.lock().await;

        // Detach handlers before signalling so the old close handler cannot
        // write conflicting state, then kill the old process group.
        let (old_pgid, old_exit, generation, session, skip_permissions) = {
            let mut inner = self.inner.lock();
            let entry =
                inner.agents.get_mut(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
            let session = target_session_id
                .or_else(|| entry.agent.session_id.clone())
                .ok_or_else(|| SupervisorError::NoSession(id.clone()))?;
            let (pgid, exit) = entry.proc.detach();
            if pgid.is_some() {
                entry.agent.status = AgentStatus::Killing;
            }
            (
                pgid,
                exit,
                entry.proc.generation,
                session,
                entry.agent.dangerously_skip_permissions,
            )
        };
        if let Some(pgid) = old_pgid {
            signal::term_then_kill(pgid, old_exit).await;
        }

        // Running is persisted before the spawn so can_deliver flips false
        // for any concurrent auto-delivery attempt.
        let agent = {
            let mut inner = self.inner.lock();
            let entry =
                inner.agents.get_mut(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
            entry.agent.status = AgentStatus::Running;
            entry.agent.touch(self.clock.epoch_ms());
            entry.proc.line_buffer.clear();
            entry.proc.paused = false;
            entry.proc.batch_scheduled = false;
            // stall_count survives delivery: only genuine assistant
            // progress clears the strike counter, so an agent that is
            // repeatedly revived but never produces output still errors
            // out on the third stall.
            entry.agent.clone()
        };
        self.state.save(&agent, true);

        // The workspace may have been pruned between turns.
        workspace::ensure_workspace(
            &self.config,
            &agent.workspace_dir,
            &agent.name,
            id.as_str(),
            &self.tokens,
        )?;

        self.record_event(id, generation, StreamEvent::UserPrompt { text: prompt.to_string() });

        let spawn_spec = SpawnSpec {
            model: agent.model.clone(),
            max_turns: max_turns.unwrap_or(self.config.default_max_turns),
            resume: Some(session),
            skip_permissions,
            prompt: prompt.to_string(),
        };
        let env = envs::build_env(&self.config, &agent, &self.tokens);
        match spawn::launch(&self.config.agent_bin, &spawn_spec, &env, &agent.workspace_dir) {
            Ok((child, pid)) => {
                let exit_rx = spawn::attach(self, id, generation, child);
                let mut inner = self.inner.lock();
                if let Some(entry) = inner.agents.get_mut(id) {
                    entry.proc.pgid = Some(pid);
                    entry.proc.exit_rx = Some(exit_rx);
                }
                tracing::info!(agent_id = %id, pid, "agent resumed");
                Ok(())
            }
            Err(e) => {
                self.mark_error(id);
                Err(SupervisorError::SpawnFailed { id: id.clone(), source: e })
            }
        }
    }

    // --- delivery gating ---

    /// True iff a prompt can be delivered now. A `true` return atomically
    /// claims the delivery slot; the caller must call
    /// [`Supervisor::delivery_done`] afterwards.
    pub fn can_deliver(&self, id: &AgentId) -> bool {
        let mut inner = self.inner.lock();
        if inner.delivering.contains(id) {
            return false;
        }
        let Some(entry) = inner.agents.get(id) else {
            return false;
        };
        if !entry.agent.status.is_deliverable() || entry.agent.session_id.is_none() {
            return false;
        }
        inner.delivering.insert(id.clone());
        true
    }

    pub fn delivery_done(&self, id: &AgentId) {
        self.inner.lock().delivering.remove(id);
    }

    /// Whether an interrupt can preempt the agent's current turn.
    pub fn can_interrupt(&self, id: &AgentId) -> bool {
        let inner = self.inner.lock();
        let Some(entry) = inner.agents.get(id) else {
            return false;
        };
        matches!(entry.agent.status, AgentStatus::Running | AgentStatus::Starting)
            && entry.proc.process_alive()
            && entry.agent.session_id.is_some()
    }

    // --- pause / resume ---

    pub fn pause(&self, id: &AgentId) -> Result<(), SupervisorError> {
        let agent = {
            let mut inner = self.inner.lock();
            let entry =
                inner.agents.get_mut(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
            let pgid =
                entry.proc.pgid.ok_or_else(|| SupervisorError::NoProcess(id.clone()))?;
            signal::stop_group(pgid);
            entry.agent.status = AgentStatus::Paused;
            entry.agent.clone()
        };
        self.state.save(&agent, true);
        let generation = self.generation_of(id);
        self.record_event(id, generation, StreamEvent::system_note("paused", "agent paused"));
        Ok(())
    }

    pub fn resume(&self, id: &AgentId) -> Result<(), SupervisorError> {
        let (agent, went_idle) = {
            let mut inner = self.inner.lock();
            let entry =
                inner.agents.get_mut(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
            if entry.agent.status != AgentStatus::Paused {
                return Err(SupervisorError::AgentBusy {
                    id: id.clone(),
                    status: entry.agent.status,
                });
            }
            let went_idle = match entry.proc.pgid {
                // Exited while paused: park idle so the next delivery
                // respawns via --resume.
                Some(_) if entry.proc.exit_code().is_some() => {
                    entry.proc.pgid = None;
                    entry.agent.status = AgentStatus::Idle;
                    true
                }
                Some(pgid) => {
                    signal::cont_group(pgid);
                    entry.agent.status = AgentStatus::Running;
                    false
                }
                None => {
                    entry.agent.status = AgentStatus::Idle;
                    true
                }
            };
            entry.agent.touch(self.clock.epoch_ms());
            (entry.agent.clone(), went_idle)
        };
        self.state.save(&agent, true);
        let generation = self.generation_of(id);
        self.record_event(id, generation, StreamEvent::system_note("resumed", "agent resumed"));
        if went_idle {
            self.notify_idle(id);
        }
        Ok(())
    }

    // --- teardown ---

    /// Destroy one agent: remove it from the live map, then tear down
    /// behind its lifecycle lock.
    pub async fn destroy(&self, id: &AgentId) -> Result<(), SupervisorError> {
        let mut entry = {
            let mut inner = self.inner.lock();
            inner.delivering.remove(id);
            let mut entry =
                inner.agents.remove(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
            entry.agent.status = AgentStatus::Destroying;
            entry
        };

        let lifecycle = Arc::clone(&entry.lifecycle);
        let _guard = lifecycle.lock().await;

        // Flush pending batches so the final log is complete.
        let lines = std::mem::take(&mut entry.proc.persist_batch);
        if !lines.is_empty() {
            let _ = entry.writer_tx.send(WriterOp::Append(lines));
        }
        let (pgid, exit_rx) = entry.proc.detach();
        if let Some(pgid) = pgid {
            signal::term_then_kill(pgid, exit_rx).await;
        }

        let mut final_events = std::mem::take(&mut entry.proc.listener_batch);
        final_events.push(StreamEvent::Destroyed);
        for tx in entry.proc.listeners.values() {
            for event in &final_events {
                let _ = tx.send(event.clone());
            }
        }
        entry.proc.listeners.clear();

        let _ = entry.writer_tx.send(WriterOp::Remove);
        let _ = std::fs::remove_file(workspace::memory_file(&self.config, id.as_str()));
        workspace::remove_workspace(&self.config, &entry.agent.workspace_dir, id.as_str());
        self.state.remove(id);
        tracing::info!(agent_id = %id, "agent destroyed");
        Ok(())
    }

    /// Graceful shutdown: flush everything, terminate children, keep state
    /// files so the next start restores the agents.
    pub async fn dispose(&self) {
        self.cancel.cancel();
        let entries: Vec<Entry> = {
            let mut inner = self.inner.lock();
            inner.delivering.clear();
            inner.idle_listeners.clear();
            inner.agents.drain().map(|(_, e)| e).collect()
        };
        for mut entry in entries {
            let lines = std::mem::take(&mut entry.proc.persist_batch);
            if !lines.is_empty() {
                let _ = entry.writer_tx.send(WriterOp::Append(lines));
            }
            let events = std::mem::take(&mut entry.proc.listener_batch);
            for tx in entry.proc.listeners.values() {
                for event in &events {
                    let _ = tx.send(event.clone());
                }
            }
            let (pgid, _) = entry.proc.detach();
            if let Some(pgid) = pgid {
                signal::term_group(pgid);
            }
            let _ = entry.writer_tx.send(WriterOp::Shutdown);
            self.state.save(&entry.agent, true);
        }
        self.state.flush_all();
        tracing::info!("supervisor disposed");
    }

    /// Nuclear teardown: SIGKILL every tracked process group, delete all
    /// state and logs, write the tombstone, and (when configured for a
    /// dedicated container) sweep every remaining visible process.
    pub fn emergency_destroy_all(&self, reason: &str) {
        let now = self.clock.epoch_ms();
        self.kill.mark_killed(reason, now);
        self.cancel.cancel();

        let entries: Vec<Entry> = {
            let mut inner = self.inner.lock();
            inner.delivering.clear();
            inner.idle_listeners.clear();
            inner.recent_creates.clear();
            inner.agents.drain().map(|(_, e)| e).collect()
        };
        for mut entry in entries {
            let (pgid, _) = entry.proc.detach();
            entry.proc.listeners.clear();
            if let Some(pgid) = pgid {
                signal::kill_group(pgid);
            }
            let _ = entry.writer_tx.send(WriterOp::Remove);
            self.state.remove(&entry.agent.id);
        }
        self.state.write_tombstone(reason);

        if self.config.sweep_untracked_on_emergency {
            signal::sweep_all_processes();
            // Second pass for processes born mid-kill.
            tokio::spawn(async move {
                tokio::time::sleep(EMERGENCY_RESWEEP).await;
                signal::sweep_all_processes();
            });
        }
        tracing::error!(reason, "emergency destroy-all complete");
    }

    // --- restoration ---

    /// Revive agents from disk after a restart. Processes are necessarily
    /// gone; agents with a session come back deliverable (`restored`),
    /// sessionless ones come back inert (`disconnected`), terminal errors
    /// stay errors.
    pub fn restore(&self) -> Result<usize, SupervisorError> {
        if self.state.has_tombstone() {
            return Err(SupervisorError::TombstonePresent);
        }
        let stored = self.state.load_all()?;
        let mut count = 0;
        for mut agent in stored {
            if let Err(e) = workspace::ensure_workspace(
                &self.config,
                &agent.workspace_dir,
                &agent.name,
                agent.id.as_str(),
                &self.tokens,
            ) {
                tracing::warn!(agent_id = %agent.id, error = %e, "workspace revival failed");
            }
            agent.status = match agent.status {
                AgentStatus::Error => AgentStatus::Error,
                _ if agent.session_id.is_some() => AgentStatus::Restored,
                _ => AgentStatus::Disconnected,
            };
            let writer_tx = writer::spawn_writer(self.events.clone(), agent.id.clone());
            {
                let mut inner = self.inner.lock();
                inner.agents.insert(
                    agent.id.clone(),
                    Entry {
                        agent: agent.clone(),
                        proc: AgentProc::new(),
                        lifecycle: Arc::new(tokio::sync::Mutex::new(())),
                        writer_tx,
                    },
                );
            }
            self.state.save(&agent, true);
            count += 1;
        }
        self.state.cleanup_stale(&self.config.events_dir);
        tracing::info!(count, "agents restored");
        Ok(count)
    }

    // --- snapshots ---

    pub fn list(&self) -> Vec<Agent> {
        self.inner.lock().agents.values().map(|e| e.agent.clone()).collect()
    }

    pub fn get(&self, id: &AgentId) -> Option<Agent> {
        self.inner.lock().agents.get(id).map(|e| e.agent.clone())
    }

    pub fn summary(&self) -> AgentSummary {
        let inner = self.inner.lock();
        let mut by_status: HashMap<AgentStatus, usize> = HashMap::new();
        for entry in inner.agents.values() {
            *by_status.entry(entry.agent.status).or_insert(0) += 1;
        }
        AgentSummary { total: inner.agents.len(), by_status }
    }

    /// Agents ready to take orchestrated work: deliverable with a session.
    pub fn deliverable_agents(&self) -> Vec<Agent> {
        let inner = self.inner.lock();
        inner
            .agents
            .values()
            .filter(|e| e.agent.status.is_deliverable() && e.agent.session_id.is_some())
            .map(|e| e.agent.clone())
            .collect()
    }

    // --- events: ring buffer and reconnect ---

    /// Recent events for reconnect replay: from memory when the ring has
    /// anything, otherwise from the disk log (which then hydrates the ring
    /// for subsequent reads).
    pub fn get_events(&self, id: &AgentId) -> Result<Vec<StreamEvent>, SupervisorError> {
        {
            let inner = self.inner.lock();
            let entry =
                inner.agents.get(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
            if entry.proc.ring.total() > 0 {
                return Ok(entry.proc.ring.snapshot());
            }
        }
        let replay = self.events.read(id)?;
        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.agents.get_mut(id) {
                if entry.proc.ring.total() == 0 {
                    entry.proc.ring.hydrate(&replay);
                }
            }
        }
        Ok(replay)
    }

    /// Subscribe to an agent's sanitized event stream. Returns a token for
    /// [`Supervisor::unsubscribe`]; dropping the receiver also detaches on
    /// the next flush.
    pub fn subscribe(
        &self,
        id: &AgentId,
    ) -> Result<(u64, mpsc::UnboundedReceiver<StreamEvent>), SupervisorError> {
        let mut inner = self.inner.lock();
        let entry =
            inner.agents.get_mut(id).ok_or_else(|| SupervisorError::NotFound(id.clone()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((entry.proc.add_listener(tx), rx))
    }

    pub fn unsubscribe(&self, id: &AgentId, token: u64) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.agents.get_mut(id) {
            entry.proc.listeners.remove(&token);
        }
    }

    /// Subscribe to idle transitions (exit 0, stall, resume-to-idle).
    pub fn subscribe_idle(&self) -> mpsc::UnboundedReceiver<AgentId> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().idle_listeners.push(tx);
        rx
    }

    // --- TTL sweep ---

    /// Destroy idle agents past the session TTL and paused agents past the
    /// pause TTL. Returns how many were destroyed.
    pub async fn sweep_expired(&self) -> usize {
        let limits = &self.config.limits;
        let expired: Vec<AgentId> = {
            let inner = self.inner.lock();
            inner
                .agents
                .values()
                .filter(|e| {
                    let age = self.clock.ms_since(e.agent.last_activity);
                    match e.agent.status {
                        AgentStatus::Idle | AgentStatus::Restored | AgentStatus::Disconnected => {
                            age > limits.session_ttl_ms
                        }
                        AgentStatus::Paused => age > limits.paused_ttl_ms,
                        _ => false,
                    }
                })
                .map(|e| e.agent.id.clone())
                .collect()
        };
        let mut destroyed = 0;
        for id in expired {
            tracing::info!(agent_id = %id, "destroying expired agent");
            if self.destroy(&id).await.is_ok() {
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Start the periodic loops: watchdog, state flush, TTL sweep, token
    /// refresh. All stop when the supervisor's cancel token fires.
    pub fn spawn_periodic_tasks(&self) {
        self.spawn_watchdog();

        let sup = self.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATE_FLUSH_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => sup.state.flush_all(),
                }
            }
        });

        let sup = self.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        sup.sweep_expired().await;
                    }
                }
            }
        });

        let sup = self.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TOKEN_REFRESH_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the immediate first tick; workspaces were just provisioned.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => sup.refresh_tokens(),
                }
            }
        });
    }

    /// Rewrite every live agent's workspace token file.
    pub fn refresh_tokens(&self) {
        let targets: Vec<(AgentId, std::path::PathBuf)> = {
            let inner = self.inner.lock();
            inner
                .agents
                .values()
                .map(|e| (e.agent.id.clone(), e.agent.workspace_dir.clone()))
                .collect()
        };
        for (id, dir) in targets {
            if let Err(e) = workspace::refresh_token(&dir, id.as_str(), &self.tokens) {
                tracing::warn!(agent_id = %id, error = %e, "token refresh failed");
            }
        }
    }

    // --- internal helpers ---

    pub(crate) fn mark_error(&self, id: &AgentId) {
        let agent = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.agents.get_mut(id) else {
                return;
            };
            entry.agent.status = AgentStatus::Error;
            entry.agent.clone()
        };
        self.state.save(&agent, true);
    }

    pub(crate) fn generation_of(&self, id: &AgentId) -> u64 {
        self.inner.lock().agents.get(id).map(|e| e.proc.generation).unwrap_or(0)
    }

    /// Insert an agent without spawning a process.
    #[cfg(test)]
    pub(crate) fn insert_test_agent(&self, agent: Agent) {
        let writer_tx = writer::spawn_writer(self.events.clone(), agent.id.clone());
        self.inner.lock().agents.insert(
            agent.id.clone(),
            Entry {
                agent,
                proc: AgentProc::new(),
                lifecycle: Arc::new(tokio::sync::Mutex::new(())),
                writer_tx,
            },
        );
    }

    /// Mutate an agent's proc state directly.
    #[cfg(test)]
    pub(crate) fn with_proc_mut<R>(
        &self,
        id: &AgentId,
        f: impl FnOnce(&mut AgentProc, &mut Agent) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.lock();
        inner.agents.get_mut(id).map(|e| f(&mut e.proc, &mut e.agent))
    }

    #[cfg(test)]
    pub(crate) fn lifecycle_of(&self, id: &AgentId) -> Option<Arc<tokio::sync::Mutex<()>>> {
        self.inner.lock().agents.get(id).map(|e| Arc::clone(&e.lifecycle))
    }
}

fn dedup_key(parent: Option<&AgentId>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}:{name}"),
        None => format!("root:{name}"),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decomposition, assignment, results, and grade escalation.

use crate::error::OrchestratorError;
use crate::events::{OrchestratorEvent, EVENT_LOG_CAP};
use crate::host::AgentHost;
use hive_bus::{MessageBus, PostSpec};
use hive_core::{Clock, Grade, MessageType, Risk, SystemClock, Task, TaskId, TaskStatus};
use hive_graph::{GraphError, TaskGraph, TaskQuery, TaskSpec};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sender id the orchestrator uses on the bus.
pub const ORCHESTRATOR_ID: &str = "orchestrator";

/// Most subtasks accepted in one decomposition.
pub const MAX_SUBTASKS: usize = 50;

/// Default assignment loop period.
pub const ASSIGNMENT_INTERVAL: Duration = Duration::from_secs(5);

/// One subtask in a goal decomposition. `depends_on` holds indices of
/// earlier subtasks in the same call, resolved to task ids on creation.
#[derive(Debug, Clone, Default)]
pub struct SubtaskSpec {
    pub title: String,
    pub description: Option<String>,
    pub priority: u8,
    pub depends_on: Vec<usize>,
    pub required_capabilities: Vec<String>,
    pub input: Option<String>,
    pub expected_output: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub max_retries: Option<u32>,
    pub timeout_ms: Option<u64>,
}

/// Input to [`Orchestrator::decompose_goal`].
#[derive(Debug, Clone)]
pub struct DecomposeSpec {
    pub goal: String,
    pub subtasks: Vec<SubtaskSpec>,
    pub parent_task_id: Option<TaskId>,
}

/// Reported outcome of a task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Completed,
    Failed,
}

/// Input to [`Orchestrator::submit_result`].
#[derive(Debug, Clone)]
pub struct ResultSubmission {
    pub task_id: TaskId,
    pub status: SubmitStatus,
    pub output: Option<String>,
    pub confidence: Option<f64>,
    pub duration_ms: Option<u64>,
    pub error_message: Option<String>,
}

/// Outcome of a result submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub unblocked: Vec<Task>,
    pub retried: bool,
    pub error: Option<String>,
}

/// The orchestrator.
pub struct Orchestrator<C: Clock = SystemClock> {
    graph: TaskGraph<C>,
    bus: MessageBus,
    host: Arc<dyn AgentHost>,
    events: Mutex<VecDeque<OrchestratorEvent>>,
    loop_cancel: Mutex<Option<CancellationToken>>,
    clock: C,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(graph: TaskGraph<C>, bus: MessageBus, host: Arc<dyn AgentHost>, clock: C) -> Arc<Self> {
        Arc::new(Self {
            graph,
            bus,
            host,
            events: Mutex::new(VecDeque::new()),
            loop_cancel: Mutex::new(None),
            clock,
        })
    }

    pub fn graph(&self) -> &TaskGraph<C> {
        &self.graph
    }

    /// Validate and create a goal's subtasks in insertion order, resolving
    /// intra-call dependency indices to the freshly created ids.
    pub fn decompose_goal(&self, spec: DecomposeSpec) -> Result<Vec<Task>, OrchestratorError> {
        if spec.subtasks.is_empty() {
            return Err(OrchestratorError::EmptyDecomposition);
        }
        if spec.subtasks.len() > MAX_SUBTASKS {
            return Err(OrchestratorError::TooManySubtasks {
                got: spec.subtasks.len(),
                max: MAX_SUBTASKS,
            });
        }
        // Indices may only point at earlier subtasks, so a subtask can
        // never depend on itself and the batch stays acyclic.
        for (task_index, subtask) in spec.subtasks.iter().enumerate() {
            for &dep_index in &subtask.depends_on {
                if dep_index >= task_index {
                    return Err(OrchestratorError::InvalidDependencyIndex {
                        task_index,
                        dep_index,
                    });
                }
            }
        }

        let mut created: Vec<Task> = Vec::with_capacity(spec.subtasks.len());
        for subtask in spec.subtasks {
            let depends_on: Vec<TaskId> =
                subtask.depends_on.iter().map(|&i| created[i].id.clone()).collect();
            let task = self.graph.create_task(TaskSpec {
                title: subtask.title,
                description: subtask
                    .description
                    .or_else(|| Some(format!("Part of goal: {}", spec.goal))),
                priority: subtask.priority,
                depends_on,
                parent_task_id: spec.parent_task_id.clone(),
                required_capabilities: subtask.required_capabilities,
                input: subtask.input,
                expected_output: subtask.expected_output,
                acceptance_criteria: subtask.acceptance_criteria,
                max_retries: subtask.max_retries,
                timeout_ms: subtask.timeout_ms,
            })?;
            created.push(task);
        }
        tracing::info!(goal = %spec.goal, count = created.len(), "goal decomposed");
        Ok(created)
    }

    /// One assignment pass: expire overdue work, then pair each available
    /// agent with its best matching task and route the assignment as a
    /// `task` message.
    pub fn assignment_cycle(&self) -> usize {
        if self.host.is_killed() {
            return 0;
        }
        self.expire_overdue();

        let mut assigned = 0;
        for agent in self.host.available_agents() {
            let capabilities = agent.capabilities.clone().unwrap_or_default();
            let Some(task) = self.graph.get_next_task(&capabilities) else {
                continue;
            };
            match self.graph.assign_task(&task.id, &agent.id, task.version) {
                Ok(task) => {
                    self.bus.post(
                        PostSpec::new(ORCHESTRATOR_ID, MessageType::Task, assignment_body(&task))
                            .from_name("orchestrator")
                            .to(agent.id.clone()),
                    );
                    self.push_event(OrchestratorEvent::Assigned {
                        task_id: task.id.clone(),
                        agent_id: agent.id.clone(),
                        at: self.clock.epoch_ms(),
                    });
                    tracing::info!(task_id = %task.id, agent_id = %agent.id, "task assigned");
                    assigned += 1;
                }
                // Someone mutated the task between selection and claim;
                // the next cycle will see the new version.
                Err(GraphError::VersionConflict { .. }) => continue,
                Err(e) => tracing::warn!(task_id = %task.id, error = %e, "assignment failed"),
            }
        }
        assigned
    }

    /// Apply a reported result with retry semantics.
    pub fn submit_result(&self, submission: ResultSubmission) -> SubmitOutcome {
        let Some(task) = self.graph.get_task(&submission.task_id) else {
            return SubmitOutcome {
                accepted: false,
                error: Some(format!("unknown task: {}", submission.task_id)),
                ..Default::default()
            };
        };
        let owner = task.owner_agent_id.clone();
        let now = self.clock.epoch_ms();

        match submission.status {
            SubmitStatus::Completed => match self.graph.complete_task(&task.id, task.version) {
                Ok(outcome) => {
                    if let Some(owner) = &owner {
                        self.graph.record_outcome(owner, &task.required_capabilities, true);
                    }
                    self.push_event(OrchestratorEvent::Completed {
                        task_id: task.id.clone(),
                        unblocked: outcome.unblocked.len(),
                        at: now,
                    });
                    tracing::info!(task_id = %task.id, unblocked = outcome.unblocked.len(), "task completed");
                    SubmitOutcome {
                        accepted: true,
                        unblocked: outcome.unblocked,
                        ..Default::default()
                    }
                }
                Err(e) => {
                    SubmitOutcome { accepted: false, error: Some(e.to_string()), ..Default::default() }
                }
            },
            SubmitStatus::Failed => {
                let failed = match self.graph.fail_task(&task.id, task.version) {
                    Ok(failed) => failed,
                    Err(e) => {
                        return SubmitOutcome {
                            accepted: false,
                            error: Some(e.to_string()),
                            ..Default::default()
                        }
                    }
                };
                if let Some(owner) = &owner {
                    self.graph.record_outcome(owner, &task.required_capabilities, false);
                }
                let retried = self
                    .graph
                    .retry_task(&failed.id, None, failed.version)
                    .is_ok();
                self.push_event(OrchestratorEvent::Failed {
                    task_id: task.id.clone(),
                    retried,
                    reason: submission.error_message.clone(),
                    at: now,
                });
                tracing::warn!(task_id = %task.id, retried, reason = ?submission.error_message, "task failed");
                SubmitOutcome { accepted: true, retried, ..Default::default() }
            }
        }
    }

    /// Record a confidence grade for a task; a high-risk grade fails the
    /// task so it cannot auto-progress until a human approves it.
    pub fn submit_grade(
        &self,
        task_id: &TaskId,
        clarity: &str,
        confidence: &str,
        blast_radius: &str,
        reasoning: Option<String>,
    ) -> Result<Risk, OrchestratorError> {
        let grade = Grade::parse(clarity, confidence, blast_radius, reasoning)?;
        let risk = grade.risk();
        let task = self
            .graph
            .get_task(task_id)
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.clone()))?;
        let now = self.clock.epoch_ms();

        self.push_event(OrchestratorEvent::Graded { task_id: task.id.clone(), risk, at: now });

        if risk == Risk::High && !task.status.is_terminal() {
            let reason =
                format!("high-risk self-grade (score {}): requires human approval", grade.score());
            if self.graph.fail_task(&task.id, task.version).is_ok() {
                self.push_event(OrchestratorEvent::Escalated {
                    task_id: task.id.clone(),
                    reason: reason.clone(),
                    at: now,
                });
                tracing::warn!(task_id = %task.id, %risk, reason, "task escalated");
            }
        }
        Ok(risk)
    }

    /// Human approval path: complete a task regardless of its failed state.
    pub fn approve_task(&self, task_id: &TaskId) -> Result<SubmitOutcome, OrchestratorError> {
        let task = self
            .graph
            .get_task(task_id)
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.clone()))?;
        let outcome = self.graph.complete_task(&task.id, task.version)?;
        self.push_event(OrchestratorEvent::Approved {
            task_id: task.id.clone(),
            at: self.clock.epoch_ms(),
        });
        Ok(SubmitOutcome { accepted: true, unblocked: outcome.unblocked, ..Default::default() })
    }

    /// Fail (and maybe retry) assigned or running tasks past their timeout.
    fn expire_overdue(&self) {
        let now = self.clock.epoch_ms();
        for status in [TaskStatus::Assigned, TaskStatus::Running] {
            let overdue = self.graph.query_tasks(&TaskQuery {
                status: Some(status),
                ..Default::default()
            });
            for task in overdue {
                let Some(timeout) = task.timeout_ms else {
                    continue;
                };
                if self.clock.ms_since(task.updated_at) <= timeout {
                    continue;
                }
                if let Ok(failed) = self.graph.fail_task(&task.id, task.version) {
                    let retried = self.graph.retry_task(&failed.id, None, failed.version).is_ok();
                    self.push_event(OrchestratorEvent::TimedOut { task_id: task.id.clone(), at: now });
                    tracing::warn!(task_id = %task.id, retried, "task timed out");
                }
            }
        }
    }

    /// Recent orchestration events, oldest first.
    pub fn recent_events(&self) -> Vec<OrchestratorEvent> {
        self.events.lock().iter().cloned().collect()
    }

    fn push_event(&self, event: OrchestratorEvent) {
        let mut events = self.events.lock();
        events.push_back(event);
        while events.len() > EVENT_LOG_CAP {
            events.pop_front();
        }
    }

    /// Start the periodic assignment loop. Idempotent; `stop` is safe to
    /// call first.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let mut slot = self.loop_cancel.lock();
        if slot.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());

        let orch = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        orch.assignment_cycle();
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        if let Some(cancel) = self.loop_cancel.lock().take() {
            cancel.cancel();
        }
    }
}

/// Body of an assignment message: everything the agent needs to act.
fn assignment_body(task: &Task) -> String {
    let mut body = format!("Task {}: {}", task.id, task.title);
    if let Some(description) = &task.description {
        body.push_str(&format!("\n\nDescription: {description}"));
    }
    if let Some(input) = &task.input {
        body.push_str(&format!("\n\nInput: {input}"));
    }
    if let Some(expected) = &task.expected_output {
        body.push_str(&format!("\n\nExpected output: {expected}"));
    }
    if let Some(criteria) = &task.acceptance_criteria {
        body.push_str(&format!("\n\nAcceptance criteria: {criteria}"));
    }
    if let Some(timeout) = task.timeout_ms {
        body.push_str(&format!("\n\nTimeout: {} s", timeout / 1000));
    }
    body.push_str(&format!(
        "\n\nReport the result with task id {} (version {}).",
        task.id, task.version
    ));
    body
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The graph itself.

use crate::error::GraphError;
use crate::profile;
use crate::spec::{
    TaskQuery, TaskSpec, DEFAULT_MAX_RETRIES, MAX_DEPS, MAX_REQUIRED_CAPS, MAX_TEXT_LEN,
    MAX_TITLE_LEN,
};
use hive_core::{AgentId, CapabilityProfile, Clock, SystemClock, Task, TaskId, TaskStatus};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a successful completion: the task plus any tasks it unblocked.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub task: Task,
    pub unblocked: Vec<Task>,
}

/// Aggregate view for hosts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub total: usize,
    pub by_status: HashMap<TaskStatus, usize>,
    /// Longest dependency chain in the graph.
    pub max_dependency_depth: usize,
}

/// Versioned task DAG with capability profiles.
///
/// Insertion order is preserved so age tie-breaks fall out of iteration
/// order; all access goes through one mutex, never held across I/O.
#[derive(Clone)]
pub struct TaskGraph<C: Clock = SystemClock> {
    inner: Arc<Mutex<GraphInner>>,
    clock: C,
}

struct GraphInner {
    tasks: IndexMap<TaskId, Task>,
    profiles: HashMap<AgentId, CapabilityProfile>,
}

impl TaskGraph<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for TaskGraph<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TaskGraph<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GraphInner {
                tasks: IndexMap::new(),
                profiles: HashMap::new(),
            })),
            clock,
        }
    }

    /// Validate and insert a task. Initial status is `blocked` when any
    /// dependency is not yet completed.
    pub fn create_task(&self, spec: TaskSpec) -> Result<Task, GraphError> {
        validate_spec(&spec)?;
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();

        let mut blocked = false;
        for dep in &spec.depends_on {
            match inner.tasks.get(dep) {
                Some(dep_task) => blocked |= dep_task.status != TaskStatus::Completed,
                None => return Err(GraphError::UnknownDependency(dep.clone())),
            }
        }

        let task = Task {
            id: TaskId::generate(),
            title: spec.title,
            description: spec.description,
            priority: spec.priority,
            status: if blocked { TaskStatus::Blocked } else { TaskStatus::Pending },
            depends_on: spec.depends_on,
            owner_agent_id: None,
            parent_task_id: spec.parent_task_id,
            required_capabilities: spec.required_capabilities,
            input: spec.input,
            expected_output: spec.expected_output,
            acceptance_criteria: spec.acceptance_criteria,
            max_retries: spec.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_count: 0,
            timeout_ms: spec.timeout_ms,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(task.id.clone(), task.clone());
        tracing::debug!(task_id = %task.id, status = %task.status, "task created");
        Ok(task)
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.inner.lock().tasks.get(id).cloned()
    }

    /// Query tasks in insertion (age) order.
    pub fn query_tasks(&self, query: &TaskQuery) -> Vec<Task> {
        let inner = self.inner.lock();
        let mut out: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| {
                query.status.map_or(true, |s| t.status == s)
                    && query
                        .owner_agent_id
                        .as_ref()
                        .map_or(true, |o| t.owner_agent_id.as_ref() == Some(o))
                    && query
                        .parent_task_id
                        .as_ref()
                        .map_or(true, |p| t.parent_task_id.as_ref() == Some(p))
                    && (!query.unowned || t.owner_agent_id.is_none())
                    && (!query.unblocked || deps_completed(&inner.tasks, t))
                    && query
                        .required_capability
                        .as_ref()
                        .map_or(true, |c| t.required_capabilities.contains(c))
            })
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        out
    }

    /// Tasks that list `id` among their dependencies.
    pub fn get_dependent_tasks(&self, id: &TaskId) -> Vec<Task> {
        let inner = self.inner.lock();
        inner.tasks.values().filter(|t| t.depends_on.contains(id)).cloned().collect()
    }

    /// Claim a pending task for an agent.
    pub fn assign_task(
        &self,
        id: &TaskId,
        agent: &AgentId,
        expected_version: u64,
    ) -> Result<Task, GraphError> {
        self.mutate(id, expected_version, |task| {
            if task.status != TaskStatus::Pending {
                return Err(GraphError::InvalidTransition {
                    id: task.id.clone(),
                    from: task.status,
                    to: TaskStatus::Assigned,
                });
            }
            task.status = TaskStatus::Assigned;
            task.owner_agent_id = Some(agent.clone());
            Ok(())
        })
        .map(|(task, _)| task)
    }

    /// Mark an assigned task as running.
    pub fn start_task(&self, id: &TaskId, expected_version: u64) -> Result<Task, GraphError> {
        self.mutate(id, expected_version, |task| {
            if !matches!(task.status, TaskStatus::Assigned | TaskStatus::Pending) {
                return Err(GraphError::InvalidTransition {
                    id: task.id.clone(),
                    from: task.status,
                    to: TaskStatus::Running,
                });
            }
            task.status = TaskStatus::Running;
            Ok(())
        })
        .map(|(task, _)| task)
    }

    /// Complete a task and unblock any dependents whose dependencies are now
    /// all completed. Allowed from `failed` so a human approval can override
    /// an escalation.
    pub fn complete_task(
        &self,
        id: &TaskId,
        expected_version: u64,
    ) -> Result<CompletionOutcome, GraphError> {
        let (task, unblocked) = self.mutate(id, expected_version, |task| {
            if matches!(task.status, TaskStatus::Completed | TaskStatus::Cancelled) {
                return Err(GraphError::InvalidTransition {
                    id: task.id.clone(),
                    from: task.status,
                    to: TaskStatus::Completed,
                });
            }
            task.status = TaskStatus::Completed;
            Ok(())
        })?;
        Ok(CompletionOutcome { task, unblocked })
    }

    /// Fail a task. Retry budgeting is the caller's concern (see
    /// [`TaskGraph::retry_task`]).
    pub fn fail_task(&self, id: &TaskId, expected_version: u64) -> Result<Task, GraphError> {
        self.mutate(id, expected_version, |task| {
            if task.status.is_terminal() {
                return Err(GraphError::InvalidTransition {
                    id: task.id.clone(),
                    from: task.status,
                    to: TaskStatus::Failed,
                });
            }
            task.status = TaskStatus::Failed;
            Ok(())
        })
        .map(|(task, _)| task)
    }

    pub fn cancel_task(&self, id: &TaskId, expected_version: u64) -> Result<Task, GraphError> {
        self.mutate(id, expected_version, |task| {
            if task.status.is_terminal() {
                return Err(GraphError::InvalidTransition {
                    id: task.id.clone(),
                    from: task.status,
                    to: TaskStatus::Cancelled,
                });
            }
            task.status = TaskStatus::Cancelled;
            task.owner_agent_id = None;
            Ok(())
        })
        .map(|(task, _)| task)
    }

    /// Put a failed task back in the pending pool, consuming one retry.
    /// Fails without mutation once the budget is spent.
    pub fn retry_task(
        &self,
        id: &TaskId,
        agent: Option<&AgentId>,
        expected_version: u64,
    ) -> Result<Task, GraphError> {
        self.mutate(id, expected_version, |task| {
            if task.status != TaskStatus::Failed {
                return Err(GraphError::InvalidTransition {
                    id: task.id.clone(),
                    from: task.status,
                    to: TaskStatus::Pending,
                });
            }
            if task.retry_count >= task.max_retries {
                return Err(GraphError::RetriesExhausted {
                    id: task.id.clone(),
                    retry_count: task.retry_count,
                });
            }
            task.retry_count += 1;
            task.owner_agent_id = agent.cloned();
            task.status =
                if agent.is_some() { TaskStatus::Assigned } else { TaskStatus::Pending };
            Ok(())
        })
        .map(|(task, _)| task)
    }

    pub fn delete_task(&self, id: &TaskId, expected_version: u64) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.get(id).ok_or_else(|| GraphError::NotFound(id.clone()))?;
        if task.version != expected_version {
            return Err(GraphError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                actual: task.version,
            });
        }
        inner.tasks.shift_remove(id);
        Ok(())
    }

    pub fn clear_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.tasks.len();
        inner.tasks.clear();
        count
    }

    /// Pick the best task for the given capability set: pending, unowned,
    /// unblocked, capability-satisfiable; ranked urgent-first with
    /// unprioritized last, oldest wins ties.
    pub fn get_next_task(&self, capabilities: &[String]) -> Option<Task> {
        let inner = self.inner.lock();
        inner
            .tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::Pending
                    && t.owner_agent_id.is_none()
                    && deps_completed(&inner.tasks, t)
                    && t.capabilities_satisfied_by(capabilities)
            })
            .min_by_key(|t| t.selection_rank())
            .cloned()
    }

    // -- capability profiles --

    pub fn set_profile(
        &self,
        agent: &AgentId,
        profile: CapabilityProfile,
    ) -> Result<(), GraphError> {
        profile::validate(&profile)?;
        self.inner.lock().profiles.insert(agent.clone(), profile);
        Ok(())
    }

    pub fn get_profile(&self, agent: &AgentId) -> Option<CapabilityProfile> {
        self.inner.lock().profiles.get(agent).cloned()
    }

    pub fn remove_profile(&self, agent: &AgentId) -> bool {
        self.inner.lock().profiles.remove(agent).is_some()
    }

    pub fn list_profiles(&self) -> Vec<(AgentId, CapabilityProfile)> {
        self.inner.lock().profiles.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Fold a task outcome into the owner's profile counters.
    pub fn record_outcome(&self, agent: &AgentId, capabilities: &[String], success: bool) {
        let mut inner = self.inner.lock();
        let profile = inner.profiles.entry(agent.clone()).or_default();
        if success {
            profile.total_completed += 1;
        } else {
            profile.total_failed += 1;
        }
        for tag in capabilities {
            let rate = profile.success_rate.entry(tag.clone()).or_insert(1.0);
            // Exponential moving average, biased toward history.
            let observed = if success { 1.0 } else { 0.0 };
            *rate = *rate * 0.8 + observed * 0.2;
        }
    }

    pub fn summary(&self) -> GraphSummary {
        let inner = self.inner.lock();
        let mut by_status: HashMap<TaskStatus, usize> = HashMap::new();
        for task in inner.tasks.values() {
            *by_status.entry(task.status).or_insert(0) += 1;
        }

        let mut depths: HashMap<TaskId, usize> = HashMap::new();
        let mut max_depth = 0;
        // Insertion order guarantees dependencies precede dependents.
        for task in inner.tasks.values() {
            let depth = task
                .depends_on
                .iter()
                .filter_map(|d| depths.get(d))
                .max()
                .map_or(0, |d| d + 1);
            max_depth = max_depth.max(depth);
            depths.insert(task.id.clone(), depth);
        }

        GraphSummary { total: inner.tasks.len(), by_status, max_dependency_depth: max_depth }
    }

    /// Shared mutation path: version check, apply, bump version, recompute
    /// unblocking when the mutation completed the task.
    fn mutate<F>(
        &self,
        id: &TaskId,
        expected_version: u64,
        apply: F,
    ) -> Result<(Task, Vec<Task>), GraphError>
    where
        F: FnOnce(&mut Task) -> Result<(), GraphError>,
    {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();

        let task = inner.tasks.get_mut(id).ok_or_else(|| GraphError::NotFound(id.clone()))?;
        if task.version != expected_version {
            return Err(GraphError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                actual: task.version,
            });
        }

        let mut staged = task.clone();
        apply(&mut staged)?;
        staged.version += 1;
        staged.updated_at = now;
        let completed = staged.status == TaskStatus::Completed;
        let result = staged.clone();
        if let Some(slot) = inner.tasks.get_mut(id) {
            *slot = staged;
        }

        let unblocked = if completed { recompute_blocked(&mut inner.tasks, now) } else { Vec::new() };
        Ok((result, unblocked))
    }
}

/// Whether every dependency of `task` is completed.
fn deps_completed(tasks: &IndexMap<TaskId, Task>, task: &Task) -> bool {
    task.depends_on
        .iter()
        .all(|d| tasks.get(d).is_some_and(|t| t.status == TaskStatus::Completed))
}

/// Move blocked tasks with fully-completed dependencies to pending.
/// Versions bump so optimistic readers notice.
fn recompute_blocked(tasks: &mut IndexMap<TaskId, Task>, now: u64) -> Vec<Task> {
    let ready: Vec<TaskId> = tasks
        .values()
        .filter(|t| t.status == TaskStatus::Blocked && deps_completed(tasks, t))
        .map(|t| t.id.clone())
        .collect();

    let mut unblocked = Vec::new();
    for id in ready {
        if let Some(task) = tasks.get_mut(&id) {
            task.status = TaskStatus::Pending;
            task.version += 1;
            task.updated_at = now;
            unblocked.push(task.clone());
        }
    }
    unblocked
}

fn validate_spec(spec: &TaskSpec) -> Result<(), GraphError> {
    if spec.title.trim().is_empty() {
        return Err(GraphError::EmptyTitle);
    }
    if spec.title.chars().count() > MAX_TITLE_LEN {
        return Err(GraphError::FieldTooLong { field: "title", max: MAX_TITLE_LEN });
    }
    if spec.priority > hive_core::task::PRIORITY_MAX {
        return Err(GraphError::InvalidPriority(spec.priority));
    }
    for (field, value) in [
        ("description", &spec.description),
        ("input", &spec.input),
        ("expectedOutput", &spec.expected_output),
        ("acceptanceCriteria", &spec.acceptance_criteria),
    ] {
        if let Some(text) = value {
            if text.chars().count() > MAX_TEXT_LEN {
                return Err(GraphError::FieldTooLong { field, max: MAX_TEXT_LEN });
            }
        }
    }
    if spec.depends_on.len() > MAX_DEPS {
        return Err(GraphError::TooManyEntries { field: "dependsOn", max: MAX_DEPS });
    }
    if spec.required_capabilities.len() > MAX_REQUIRED_CAPS {
        return Err(GraphError::TooManyEntries {
            field: "requiredCapabilities",
            max: MAX_REQUIRED_CAPS,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;

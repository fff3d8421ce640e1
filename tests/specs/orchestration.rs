// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-loop orchestration spec: decompose, assign, deliver, submit,
//! unblock.

use crate::prelude::{Harness, QUICK_STUB};
use hive_bus::MessageBus;
use hive_core::{AgentStatus, Clock, SystemClock, TaskStatus};
use hive_graph::TaskGraph;
use hive_orchestrator::{
    AgentHost, AutoDelivery, DecomposeSpec, Orchestrator, ResultSubmission, SubmitStatus,
    SubtaskSpec,
};
use hive_supervisor::CreateSpec;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn goal_flows_from_decomposition_to_unblocked_followup() {
    let h = Harness::new(QUICK_STUB);
    let bus = MessageBus::new(|| SystemClock.epoch_ms());
    let host: Arc<dyn AgentHost> = Arc::new(h.sup.clone());
    let orch = Orchestrator::new(TaskGraph::new(), bus.clone(), Arc::clone(&host), SystemClock);
    let cancel = CancellationToken::new();
    AutoDelivery::spawn(bus.clone(), host, 50, cancel.clone());

    // One worker agent with the needed capability.
    let mut spec = CreateSpec::new("worker", "boot");
    spec.capabilities = Some(vec!["rust".into()]);
    let worker = h.sup.create(spec).await.unwrap();
    h.wait_status(&worker.id, AgentStatus::Idle).await;

    // Two tasks, the second blocked behind the first.
    let tasks = orch
        .decompose_goal(DecomposeSpec {
            goal: "ship it".into(),
            subtasks: vec![
                SubtaskSpec {
                    title: "implement".into(),
                    required_capabilities: vec!["rust".into()],
                    acceptance_criteria: Some("tests pass".into()),
                    ..Default::default()
                },
                SubtaskSpec {
                    title: "document".into(),
                    depends_on: vec![0],
                    ..Default::default()
                },
            ],
            parent_task_id: None,
        })
        .unwrap();
    assert_eq!(tasks[1].status, TaskStatus::Blocked);

    // Assignment routes a task message; auto-delivery pushes it into the
    // worker's next turn.
    assert_eq!(orch.assignment_cycle(), 1);
    let assigned = orch.graph().get_task(&tasks[0].id).unwrap();
    assert_eq!(assigned.status, TaskStatus::Assigned);
    assert_eq!(assigned.owner_agent_id, Some(worker.id.clone()));

    h.wait_turns(&worker.id, 2).await;
    let args = h.args_log(&worker.id);
    assert!(args[1].contains("[message from orchestrator (task)]"));
    assert!(args[1].contains("implement"));
    assert!(args[1].contains("tests pass"));

    // The worker reports success; the dependent task unblocks.
    let outcome = orch.submit_result(ResultSubmission {
        task_id: tasks[0].id.clone(),
        status: SubmitStatus::Completed,
        output: Some("done".into()),
        confidence: Some(0.95),
        duration_ms: Some(1200),
        error_message: None,
    });
    assert!(outcome.accepted);
    assert_eq!(outcome.unblocked.len(), 1);
    assert_eq!(outcome.unblocked[0].id, tasks[1].id);
    assert_eq!(orch.graph().get_task(&tasks[1].id).unwrap().status, TaskStatus::Pending);

    // Capability profile learned from the outcome.
    let profile = orch.graph().get_profile(&worker.id).unwrap();
    assert_eq!(profile.total_completed, 1);
}

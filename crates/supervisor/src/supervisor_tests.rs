// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end supervisor tests against a stub agent binary: a shell script
//! that speaks the JSONL stream contract and exits cleanly.

use super::*;
use crate::error::SupervisorError;
use hive_core::test_support::agent_fixture;
use hive_core::{FakeClock, StreamEvent};
use hive_store::KillSwitch;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;

const STUB_SCRIPT: &str = r#"#!/bin/sh
echo '{"type":"system","subtype":"init","session_id":"sess-test"}'
echo '{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"working"}],"usage":{"input_tokens":10,"output_tokens":4}}}'
echo '{"type":"result","subtype":"success","total_cost_usd":0.01,"duration_ms":5,"num_turns":1,"usage":{"input_tokens":10,"output_tokens":4}}'
exit 0
"#;

fn write_stub(temp: &TempDir, content: &str) -> String {
    let path = temp.path().join("stub-agent.sh");
    std::fs::write(&path, content).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

fn kill_for(temp: &TempDir, config: &SupervisorConfig) -> KillSwitch {
    KillSwitch::new(
        temp.path().join("kill-switch.json"),
        config.state_dir.join("_kill-switch-tombstone"),
        None,
    )
}

fn setup_with(f: impl FnOnce(&mut SupervisorConfig)) -> (TempDir, Supervisor) {
    let temp = TempDir::new().unwrap();
    let mut config = SupervisorConfig::under_root(temp.path().join("hive"));
    config.agent_bin = write_stub(&temp, STUB_SCRIPT);
    f(&mut config);
    let kill = kill_for(&temp, &config);
    let sup = Supervisor::new(config, kill).unwrap();
    (temp, sup)
}

fn setup() -> (TempDir, Supervisor) {
    setup_with(|_| {})
}

async fn wait_status(sup: &Supervisor, id: &AgentId, want: AgentStatus) {
    for _ in 0..400 {
        if sup.get(id).map(|a| a.status) == Some(want) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("agent never reached {want}, now {:?}", sup.get(id).map(|a| a.status));
}

#[tokio::test]
async fn create_captures_session_and_goes_idle() {
    let (_temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "do the thing")).await.unwrap();
    assert_eq!(agent.status, AgentStatus::Starting);
    assert_eq!(agent.depth, 1);

    wait_status(&sup, &agent.id, AgentStatus::Idle).await;

    let settled = sup.get(&agent.id).unwrap();
    assert_eq!(settled.session_id.as_deref(), Some("sess-test"));
    assert_eq!(settled.usage.turns, 1);
    assert_eq!(settled.usage.tokens_out, 8); // assistant + result
    assert!(settled.usage.cost_usd > 0.0);

    // Workspace provisioned.
    assert!(settled.workspace_dir.join("INSTRUCTIONS.md").exists());
    assert!(settled.workspace_dir.join(".hive-token").exists());
}

#[tokio::test]
async fn stream_replay_starts_with_the_original_prompt() {
    let (_temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "first prompt")).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;

    let events = sup.get_events(&agent.id).unwrap();
    assert_eq!(events[0], StreamEvent::UserPrompt { text: "first prompt".into() });
    assert!(events.iter().any(|e| e.init_session_id().is_some()));
    assert!(events.iter().any(|e| matches!(e, StreamEvent::Done { exit_code: 0 })));
}

#[tokio::test]
async fn duplicate_create_within_window_is_rejected() {
    let (_temp, sup) = setup();
    let first = sup.create(CreateSpec::new("alpha", "go")).await.unwrap();

    let err = sup.create(CreateSpec::new("alpha", "go again")).await.unwrap_err();
    match &err {
        SupervisorError::DuplicateAgent { name, existing } => {
            assert_eq!(name, "alpha");
            assert_eq!(existing, &first.id);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(err.to_string().contains("\"alpha\" was already created recently"));
    assert_eq!(sup.list().len(), 1);
}

#[tokio::test]
async fn same_name_under_different_parent_is_allowed() {
    let (_temp, sup) = setup();
    let parent = sup.create(CreateSpec::new("parent", "go")).await.unwrap();

    let mut child = CreateSpec::new("alpha", "go");
    child.parent_id = Some(parent.id.clone());
    sup.create(child).await.unwrap();
    // Root-level alpha is a different dedup key.
    sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    assert_eq!(sup.list().len(), 3);
}

#[tokio::test]
async fn agent_cap_is_enforced() {
    let (_temp, sup) = setup_with(|c| c.limits.max_agents = 1);
    sup.create(CreateSpec::new("one", "go")).await.unwrap();

    let err = sup.create(CreateSpec::new("two", "go")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::MaxAgentsReached(1)));
}

#[tokio::test]
async fn depth_cap_is_enforced() {
    let (_temp, sup) = setup_with(|c| c.limits.max_depth = 1);
    let parent = sup.create(CreateSpec::new("parent", "go")).await.unwrap();

    let mut child = CreateSpec::new("child", "go");
    child.parent_id = Some(parent.id.clone());
    let err = sup.create(child).await.unwrap_err();
    assert!(matches!(err, SupervisorError::MaxDepthExceeded { max: 1 }));
}

#[tokio::test]
async fn child_depth_is_parent_plus_one() {
    let (_temp, sup) = setup();
    let parent = sup.create(CreateSpec::new("parent", "go")).await.unwrap();
    let mut spec = CreateSpec::new("child", "go");
    spec.parent_id = Some(parent.id.clone());
    let child = sup.create(spec).await.unwrap();
    assert_eq!(child.depth, parent.depth + 1);
}

#[tokio::test]
async fn children_cap_is_enforced() {
    let (_temp, sup) = setup_with(|c| c.limits.max_children = 1);
    let parent = sup.create(CreateSpec::new("parent", "go")).await.unwrap();

    let mut first = CreateSpec::new("child-one", "go");
    first.parent_id = Some(parent.id.clone());
    sup.create(first).await.unwrap();

    let mut second = CreateSpec::new("child-two", "go");
    second.parent_id = Some(parent.id.clone());
    let err = sup.create(second).await.unwrap_err();
    assert!(matches!(err, SupervisorError::MaxChildrenExceeded { max: 1, .. }));
}

#[tokio::test]
async fn unknown_parent_is_rejected() {
    let (_temp, sup) = setup();
    let mut spec = CreateSpec::new("child", "go");
    spec.parent_id = Some(AgentId::new("ghost"));
    assert!(matches!(sup.create(spec).await, Err(SupervisorError::NotFound(_))));
}

#[tokio::test]
async fn unknown_model_falls_back_to_default() {
    let (_temp, sup) = setup();
    let mut spec = CreateSpec::new("alpha", "go");
    spec.model = Some("made-up-model".into());
    let agent = sup.create(spec).await.unwrap();
    assert_eq!(agent.model, crate::pricing::default_model());
}

#[tokio::test]
async fn message_resumes_the_session() {
    let (_temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "first")).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;

    sup.message(&agent.id, "second", None, None).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;

    let events = sup.get_events(&agent.id).unwrap();
    let prompts: Vec<&StreamEvent> =
        events.iter().filter(|e| matches!(e, StreamEvent::UserPrompt { .. })).collect();
    assert_eq!(prompts.len(), 2);
    assert_eq!(sup.get(&agent.id).unwrap().usage.turns, 2);
}

#[tokio::test]
async fn message_without_session_is_rejected() {
    let (_temp, sup) = setup();
    // Inserted directly: never produced an init event.
    let agent = agent_fixture("no-session");
    sup.insert_test_agent(agent.clone());

    let err = sup.message(&agent.id, "hi", None, None).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NoSession(_)));
}

#[tokio::test]
async fn message_unknown_agent_is_rejected() {
    let (_temp, sup) = setup();
    let err = sup.message(&AgentId::new("ghost"), "hi", None, None).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NotFound(_)));
}

#[tokio::test]
async fn can_deliver_is_single_flight() {
    let (_temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;

    assert!(sup.can_deliver(&agent.id));
    assert!(!sup.can_deliver(&agent.id)); // slot already claimed
    sup.delivery_done(&agent.id);
    assert!(sup.can_deliver(&agent.id));
    sup.delivery_done(&agent.id);
}

#[tokio::test]
async fn can_deliver_requires_deliverable_status_and_session() {
    let (_temp, sup) = setup();
    let mut running = agent_fixture("running");
    running.status = AgentStatus::Running;
    running.session_id = Some("s".into());
    sup.insert_test_agent(running.clone());
    assert!(!sup.can_deliver(&running.id));

    let mut idle_no_session = agent_fixture("idle-ns");
    idle_no_session.status = AgentStatus::Idle;
    sup.insert_test_agent(idle_no_session.clone());
    assert!(!sup.can_deliver(&idle_no_session.id));

    let mut restored = agent_fixture("restored");
    restored.status = AgentStatus::Restored;
    restored.session_id = Some("s".into());
    sup.insert_test_agent(restored.clone());
    assert!(sup.can_deliver(&restored.id));
    sup.delivery_done(&restored.id);
}

#[tokio::test]
async fn destroy_removes_every_trace() {
    let (_temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;

    let state_file = sup.config().state_dir.join(format!("{}.json", agent.id));
    let events_file = sup.config().events_dir.join(format!("{}.jsonl", agent.id));
    assert!(state_file.exists());

    sup.destroy(&agent.id).await.unwrap();

    assert!(sup.get(&agent.id).is_none());
    assert!(!state_file.exists());
    assert!(!agent.workspace_dir.exists());
    for _ in 0..100 {
        if !events_file.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!events_file.exists());
}

#[tokio::test]
async fn destroy_notifies_subscribers_with_destroyed() {
    let (_temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;

    let (_token, mut rx) = sup.subscribe(&agent.id).unwrap();
    sup.destroy(&agent.id).await.unwrap();

    let mut saw_destroyed = false;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
    {
        if event == StreamEvent::Destroyed {
            saw_destroyed = true;
            break;
        }
    }
    assert!(saw_destroyed);
}

#[tokio::test]
async fn emergency_destroy_all_is_total() {
    let (_temp, sup) = setup();
    let a = sup.create(CreateSpec::new("one", "go")).await.unwrap();
    let b = sup.create(CreateSpec::new("two", "go")).await.unwrap();
    wait_status(&sup, &a.id, AgentStatus::Idle).await;
    wait_status(&sup, &b.id, AgentStatus::Idle).await;

    sup.emergency_destroy_all("operator hit the button");

    assert!(sup.list().is_empty());
    assert!(sup.kill_switch().is_killed());
    assert!(sup.config().state_dir.join("_kill-switch-tombstone").exists());

    let err = sup.create(CreateSpec::new("three", "go")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::KillSwitchActive));
    assert!(err.to_string().contains("kill switch active"));
}

#[tokio::test]
async fn restore_revives_agents_with_sessions() {
    let (temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;
    sup.dispose().await;

    let mut config = SupervisorConfig::under_root(temp.path().join("hive"));
    config.agent_bin = write_stub(&temp, STUB_SCRIPT);
    let kill = kill_for(&temp, &config);
    let revived = Supervisor::new(config, kill).unwrap();

    assert_eq!(revived.restore().unwrap(), 1);
    let restored = revived.get(&agent.id).unwrap();
    assert_eq!(restored.status, AgentStatus::Restored);
    assert_eq!(restored.session_id.as_deref(), Some("sess-test"));
    // Restored agents are deliverable.
    assert!(revived.can_deliver(&agent.id));
    revived.delivery_done(&agent.id);
}

#[tokio::test]
async fn restore_refuses_with_tombstone() {
    let (temp, sup) = setup();
    let agent = sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    wait_status(&sup, &agent.id, AgentStatus::Idle).await;
    sup.emergency_destroy_all("bad day");

    let mut config = SupervisorConfig::under_root(temp.path().join("hive"));
    config.agent_bin = write_stub(&temp, STUB_SCRIPT);
    let kill = kill_for(&temp, &config);
    let revived = Supervisor::new(config, kill).unwrap();

    assert!(matches!(revived.restore(), Err(SupervisorError::TombstonePresent)));
    assert!(revived.list().is_empty());
}

#[tokio::test]
async fn sweep_destroys_expired_idle_agents() {
    let temp = TempDir::new().unwrap();
    let config = SupervisorConfig::under_root(temp.path().join("hive"));
    let kill = kill_for(&temp, &config);
    let clock = FakeClock::new();
    let sup = Supervisor::with_clock(config, kill, clock.clone()).unwrap();

    let mut old = agent_fixture("old");
    old.status = AgentStatus::Idle;
    old.session_id = Some("s".into());
    old.last_activity = clock.epoch_ms();
    sup.insert_test_agent(old.clone());

    let mut paused = agent_fixture("paused");
    paused.status = AgentStatus::Paused;
    paused.last_activity = clock.epoch_ms();
    sup.insert_test_agent(paused.clone());

    // Past the 4 h session TTL, inside the 24 h pause TTL.
    clock.advance(Duration::from_secs(5 * 60 * 60));
    assert_eq!(sup.sweep_expired().await, 1);
    assert!(sup.get(&old.id).is_none());
    assert!(sup.get(&paused.id).is_some());

    // Past the pause TTL too.
    clock.advance(Duration::from_secs(20 * 60 * 60));
    assert_eq!(sup.sweep_expired().await, 1);
    assert!(sup.get(&paused.id).is_none());
}

#[tokio::test]
async fn summary_counts_by_status() {
    let (_temp, sup) = setup();
    let a = sup.create(CreateSpec::new("one", "go")).await.unwrap();
    wait_status(&sup, &a.id, AgentStatus::Idle).await;

    let summary = sup.summary();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.by_status.get(&AgentStatus::Idle), Some(&1));
}

#[tokio::test]
async fn spawn_failure_marks_agent_error() {
    let (_temp, sup) = setup_with(|c| c.agent_bin = "/nonexistent/agent-bin".into());
    let err = sup.create(CreateSpec::new("alpha", "go")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::SpawnFailed { .. }));

    let survivors = sup.list();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].status, AgentStatus::Error);
}

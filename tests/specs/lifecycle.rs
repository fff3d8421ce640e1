// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle specs: creation, dedup, stream contract, ring replay.

use crate::prelude::{Harness, QUICK_STUB};
use hive_core::{AgentStatus, StreamEvent};
use hive_supervisor::{CreateSpec, SupervisorError};

#[tokio::test]
async fn dedup_window_rejects_second_create() {
    let h = Harness::new(QUICK_STUB);
    let parent = h.sup.create(CreateSpec::new("p", "be a parent")).await.unwrap();

    let mut first = CreateSpec::new("alpha", "go");
    first.parent_id = Some(parent.id.clone());
    let created = h.sup.create(first).await.unwrap();

    // Well inside the 10 s window.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    let mut second = CreateSpec::new("alpha", "go");
    second.parent_id = Some(parent.id.clone());
    let err = h.sup.create(second).await.unwrap_err();

    assert!(err.to_string().contains("\"alpha\" was already created recently"));
    match err {
        SupervisorError::DuplicateAgent { existing, .. } => assert_eq!(existing, created.id),
        other => panic!("unexpected: {other}"),
    }
    // Exactly one alpha exists.
    let alphas: Vec<_> = h.sup.list().into_iter().filter(|a| a.name == "alpha").collect();
    assert_eq!(alphas.len(), 1);
}

#[tokio::test]
async fn child_cli_contract_is_honored() {
    let h = Harness::new(QUICK_STUB);
    let mut spec = CreateSpec::new("alpha", "the prompt");
    spec.dangerously_skip_permissions = true;
    spec.max_turns = Some(7);
    let agent = h.sup.create(spec).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Idle).await;

    let args = h.args_log(&agent.id);
    let first = &args[0];
    assert!(first.starts_with("--dangerously-skip-permissions --output-format stream-json --verbose --max-turns 7 --model claude-sonnet-4-5"));
    assert!(first.ends_with("--print -- the prompt"));

    // A resumed turn carries the captured session id.
    h.sup.message(&agent.id, "again", None, None).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Idle).await;
    let args = h.args_log(&agent.id);
    assert!(args[1].contains("--resume sess-spec"));
}

#[tokio::test]
async fn ring_replay_is_continuous_and_capped() {
    // Burst well past the ring capacity.
    let burst_stub = r#"#!/bin/sh
echo '{"type":"system","subtype":"init","session_id":"sess-spec"}'
i=0
while [ $i -lt 1200 ]; do
  echo "{\"type\":\"user\",\"message\":{\"n\":$i}}"
  i=$((i+1))
done
exit 0
"#;
    let h = Harness::new(burst_stub);
    let agent = h.sup.create(CreateSpec::new("alpha", "flood")).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Idle).await;

    let events = h.sup.get_events(&agent.id).unwrap();
    assert_eq!(events.len(), 1000);

    // The newest events survive, ending with the synthetic done.
    assert_eq!(*events.last().unwrap(), StreamEvent::Done { exit_code: 0 });
    let numbered: Vec<i64> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::User { message: Some(m), .. } => m.get("n").and_then(|n| n.as_i64()),
            _ => None,
        })
        .collect();
    assert_eq!(*numbered.last().unwrap(), 1199);
    // Continuity: consecutive numbering with nothing lost in the middle.
    for window in numbered.windows(2) {
        assert_eq!(window[1], window[0] + 1);
    }
}

#[tokio::test]
async fn persisted_log_replays_after_restore() {
    let h = Harness::new(QUICK_STUB);
    let agent = h.sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Idle).await;
    // Let the write queue settle, then shut down gracefully.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    h.sup.dispose().await;

    // A second supervisor over the same state directories.
    let config = h.sup.config().clone();
    let kill = hive_store::KillSwitch::new(
        h.temp.path().join("kill-switch.json"),
        config.state_dir.join("_kill-switch-tombstone"),
        None,
    );
    let revived = hive_supervisor::Supervisor::new(config, kill).unwrap();
    revived.restore().unwrap();

    let replayed = revived.get_events(&agent.id).unwrap();
    assert_eq!(replayed[0], StreamEvent::UserPrompt { text: "go".into() });
    assert!(replayed.iter().any(|e| e.init_session_id() == Some("sess-spec")));
    assert_eq!(*replayed.last().unwrap(), StreamEvent::Done { exit_code: 0 });
}

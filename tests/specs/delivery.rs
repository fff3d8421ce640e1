// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-delivery specs: idle delivery and the interrupt path, end to end.

use crate::prelude::{Harness, LINGER_STUB, QUICK_STUB};
use hive_bus::{MessageBus, MessageQuery, PostSpec};
use hive_core::{AgentStatus, Clock, MessageType, SystemClock};
use hive_orchestrator::{AgentHost, AutoDelivery};
use hive_supervisor::CreateSpec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn wire(h: &Harness) -> (MessageBus, CancellationToken) {
    let bus = MessageBus::new(|| SystemClock.epoch_ms());
    let cancel = CancellationToken::new();
    let host: Arc<dyn AgentHost> = Arc::new(h.sup.clone());
    AutoDelivery::spawn(bus.clone(), host, 50, cancel.clone());
    (bus, cancel)
}

#[tokio::test]
async fn idle_agent_receives_posted_message() {
    let h = Harness::new(QUICK_STUB);
    let (bus, _cancel) = wire(&h);

    let agent = h.sup.create(CreateSpec::new("alpha", "first turn")).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Idle).await;

    bus.post(
        PostSpec::new("peer", MessageType::Info, "c").from_name("peer").to(agent.id.clone()),
    );

    // Delivery respawns the agent; the stub completes another turn.
    h.wait_turns(&agent.id, 2).await;
    h.wait_status(&agent.id, AgentStatus::Idle).await;

    // Marked read for the recipient.
    let unread = bus.query(&MessageQuery {
        to: Some(agent.id.clone()),
        unread_by: Some(agent.id.clone()),
        ..Default::default()
    });
    assert!(unread.is_empty());

    // Respawned with --resume of the captured session, prompt prefixed
    // with the sender header.
    let args = h.args_log(&agent.id);
    let resumed = &args[1];
    assert!(resumed.contains("--resume sess-spec"));
    assert!(resumed.contains("[message from peer (info)]"));
    assert!(resumed.contains('c'));
}

#[tokio::test]
async fn queued_message_delivers_on_idle_transition() {
    let h = Harness::new(QUICK_STUB);
    let (bus, _cancel) = wire(&h);

    // Post before the agent exists; nothing can deliver yet.
    let agent_name_turn = h.sup.create(CreateSpec::new("alpha", "boot")).await.unwrap();
    bus.post(PostSpec::new("peer", MessageType::Task, "queued").to(agent_name_turn.id.clone()));

    // First turn ends; the idle trigger drains the backlog after settle.
    h.wait_turns(&agent_name_turn.id, 2).await;
    h.wait_status(&agent_name_turn.id, AgentStatus::Idle).await;

    let args = h.args_log(&agent_name_turn.id);
    assert!(args.iter().any(|a| a.contains("queued")));
}

#[tokio::test]
async fn interrupt_preempts_running_turn() {
    let h = Harness::new(LINGER_STUB);
    let (bus, _cancel) = wire(&h);

    let agent = h.sup.create(CreateSpec::new("alpha", "long job")).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Running).await;

    bus.post(
        PostSpec::new("boss", MessageType::Interrupt, "stop")
            .from_name("boss")
            .to(agent.id.clone()),
    );

    // The old child is killed, a new one spawns with the interrupt prompt
    // and resumes the session; the resumed stub turn exits quickly.
    h.wait_status(&agent.id, AgentStatus::Idle).await;

    let args = h.args_log(&agent.id);
    let interrupted = args.iter().find(|a| a.contains("--resume")).expect("resumed turn");
    assert!(interrupted.contains("[INTERRUPT from boss]"));
    assert!(interrupted.contains("stop"));
}

#[tokio::test]
async fn status_chatter_is_never_delivered() {
    let h = Harness::new(QUICK_STUB);
    let (bus, _cancel) = wire(&h);

    let agent = h.sup.create(CreateSpec::new("alpha", "boot")).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Idle).await;

    bus.post(PostSpec::new("peer", MessageType::Status, "fyi").to(agent.id.clone()));
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(h.sup.get(&agent.id).unwrap().status, AgentStatus::Idle);
    assert_eq!(h.args_log(&agent.id).len(), 1); // only the boot turn
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::config::SupervisorConfig;
use crate::supervisor::Supervisor;
use hive_core::test_support::agent_fixture;
use hive_core::{AgentId, AgentStatus, Clock, FakeClock, StreamEvent};
use hive_store::KillSwitch;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

fn setup(status: AgentStatus) -> (TempDir, Supervisor<FakeClock>, AgentId, FakeClock) {
    let temp = TempDir::new().unwrap();
    let config = SupervisorConfig::under_root(temp.path());
    let kill = KillSwitch::new(
        temp.path().join("kill-switch.json"),
        config.state_dir.join("_kill-switch-tombstone"),
        None,
    );
    let clock = FakeClock::new();
    let sup = Supervisor::with_clock(config, kill, clock.clone()).unwrap();

    let mut agent = agent_fixture("a-1");
    agent.status = status;
    agent.session_id = Some("sess-1".into());
    agent.last_activity = clock.epoch_ms();
    let id = agent.id.clone();
    sup.insert_test_agent(agent);
    (temp, sup, id, clock)
}

/// Attach a fake live process: a pgid plus an open exit channel.
fn attach_fake_process(
    sup: &Supervisor<FakeClock>,
    id: &AgentId,
) -> watch::Sender<Option<i32>> {
    let (tx, rx) = watch::channel(None);
    sup.with_proc_mut(id, |proc, _| {
        // A pid far above any live process; stray signals hit ESRCH.
        proc.pgid = Some(999_999_999);
        proc.exit_rx = Some(rx);
    });
    tx
}

#[tokio::test]
async fn quiet_running_agent_is_left_alone() {
    let (_temp, sup, id, clock) = setup(AgentStatus::Running);
    let _tx = attach_fake_process(&sup, &id);

    clock.advance(Duration::from_secs(60));
    sup.watchdog_tick();

    assert_eq!(sup.get(&id).unwrap().status, AgentStatus::Running);
}

#[tokio::test]
async fn stall_marks_agent_and_emits_watchdog_event() {
    let (_temp, sup, id, clock) = setup(AgentStatus::Running);
    let _tx = attach_fake_process(&sup, &id);
    let mut idle_rx = sup.subscribe_idle();

    clock.advance(Duration::from_secs(11 * 60));
    sup.watchdog_tick();

    let agent = sup.get(&id).unwrap();
    assert_eq!(agent.status, AgentStatus::Stalled);
    assert_eq!(sup.with_proc_mut(&id, |p, _| p.stall_count).unwrap(), 1);

    // The watchdog note lands in the agent's stream.
    let events = sup.get_events(&id).unwrap();
    assert!(matches!(
        &events[0],
        StreamEvent::System { subtype: Some(s), .. } if s == "watchdog"
    ));
    // Stalled agents are deliverable, so idle listeners fire.
    assert_eq!(idle_rx.recv().await, Some(id.clone()));
}

#[tokio::test]
async fn third_stall_errors_the_agent() {
    // A child that resumes a session but never produces output: each
    // delivery revives the agent, each revival stalls again, and the
    // third stall must error it out.
    let temp = TempDir::new().unwrap();
    let stub = temp.path().join("silent-agent.sh");
    std::fs::write(&stub, "#!/bin/sh\nexec sleep 60\n").unwrap();
    std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = SupervisorConfig::under_root(temp.path().join("hive"));
    config.agent_bin = stub.display().to_string();
    let kill = KillSwitch::new(
        temp.path().join("kill-switch.json"),
        config.state_dir.join("_kill-switch-tombstone"),
        None,
    );
    let clock = FakeClock::new();
    let sup = Supervisor::with_clock(config.clone(), kill, clock.clone()).unwrap();

    let mut agent = agent_fixture("a-1");
    agent.status = AgentStatus::Stalled;
    agent.session_id = Some("sess-w".into());
    agent.workspace_dir = config.workspaces_dir.join("a-1");
    let id = agent.id.clone();
    sup.insert_test_agent(agent);

    for strike in 1..=3u32 {
        // Revival through the real delivery path: kill, respawn, running.
        sup.message(&id, "any progress?", None, None).await.unwrap();
        assert_eq!(sup.get(&id).unwrap().status, AgentStatus::Running);

        // The child stays silent past the stall timeout.
        clock.advance(Duration::from_secs(11 * 60));
        sup.watchdog_tick();

        assert_eq!(sup.with_proc_mut(&id, |p, _| p.stall_count).unwrap(), strike);
        let expected =
            if strike < 3 { AgentStatus::Stalled } else { AgentStatus::Error };
        assert_eq!(sup.get(&id).unwrap().status, expected);
    }

    // Reap the last silent child.
    sup.destroy(&id).await.unwrap();
}

#[tokio::test]
async fn start_timeout_errors_the_agent() {
    let (_temp, sup, id, clock) = setup(AgentStatus::Starting);
    clock.advance(Duration::from_secs(3 * 60));
    sup.watchdog_tick();
    assert_eq!(sup.get(&id).unwrap().status, AgentStatus::Error);
}

#[tokio::test]
async fn fresh_starting_agent_is_not_timed_out() {
    let (_temp, sup, id, clock) = setup(AgentStatus::Starting);
    clock.advance(Duration::from_secs(60));
    sup.watchdog_tick();
    assert_eq!(sup.get(&id).unwrap().status, AgentStatus::Starting);
}

#[tokio::test]
async fn dead_process_with_clean_exit_goes_idle() {
    let (_temp, sup, id, _clock) = setup(AgentStatus::Running);
    let tx = attach_fake_process(&sup, &id);
    let mut idle_rx = sup.subscribe_idle();
    tx.send(Some(0)).unwrap();

    sup.watchdog_tick();

    assert_eq!(sup.get(&id).unwrap().status, AgentStatus::Idle);
    assert_eq!(idle_rx.recv().await, Some(id.clone()));
}

#[tokio::test]
async fn dead_process_with_failure_exit_goes_error() {
    let (_temp, sup, id, _clock) = setup(AgentStatus::Running);
    let tx = attach_fake_process(&sup, &id);
    let mut idle_rx = sup.subscribe_idle();
    tx.send(Some(2)).unwrap();

    sup.watchdog_tick();

    assert_eq!(sup.get(&id).unwrap().status, AgentStatus::Error);
    assert!(idle_rx.try_recv().is_err());
}

#[tokio::test]
async fn exempt_statuses_are_skipped() {
    for status in [AgentStatus::Paused, AgentStatus::Disconnected] {
        let (_temp, sup, id, clock) = setup(status);
        clock.advance(Duration::from_secs(60 * 60));
        sup.watchdog_tick();
        assert_eq!(sup.get(&id).unwrap().status, status);
    }
}

#[tokio::test]
async fn agents_under_lifecycle_lock_are_skipped() {
    let (_temp, sup, id, clock) = setup(AgentStatus::Running);
    let _tx = attach_fake_process(&sup, &id);

    let lifecycle = sup.lifecycle_of(&id).unwrap();
    let _guard = lifecycle.lock().await;

    clock.advance(Duration::from_secs(11 * 60));
    sup.watchdog_tick();

    assert_eq!(sup.get(&id).unwrap().status, AgentStatus::Running);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kill switch and emergency teardown specs.

use crate::prelude::{Harness, QUICK_STUB};
use hive_core::AgentStatus;
use hive_supervisor::{CreateSpec, SupervisorError};

#[tokio::test]
async fn emergency_destroy_all_with_live_agents() {
    let h = Harness::new(QUICK_STUB);
    let mut ids = Vec::new();
    for name in ["one", "two", "three"] {
        ids.push(h.sup.create(CreateSpec::new(name, "go")).await.unwrap().id);
    }
    for id in &ids {
        h.wait_status(id, AgentStatus::Idle).await;
    }

    h.sup.emergency_destroy_all("spec: emergency stop");

    // Agents map empty, tombstone present, kill flag set.
    assert!(h.sup.list().is_empty());
    assert!(h.sup.kill_switch().is_killed());
    let tombstone = h.sup.config().state_dir.join("_kill-switch-tombstone");
    assert!(tombstone.exists());
    assert_eq!(
        std::fs::read_to_string(&tombstone).unwrap(),
        "spec: emergency stop"
    );

    // State files are gone too.
    for id in &ids {
        assert!(!h.sup.config().state_dir.join(format!("{id}.json")).exists());
    }

    // Subsequent creation rejects.
    let err = h.sup.create(CreateSpec::new("four", "go")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::KillSwitchActive));

    // Idempotent.
    h.sup.emergency_destroy_all("again");
    assert!(h.sup.list().is_empty());
}

#[tokio::test]
async fn restore_refuses_after_emergency() {
    let h = Harness::new(QUICK_STUB);
    let agent = h.sup.create(CreateSpec::new("alpha", "go")).await.unwrap();
    h.wait_status(&agent.id, AgentStatus::Idle).await;

    h.sup.emergency_destroy_all("stop");

    let config = h.sup.config().clone();
    let kill = hive_store::KillSwitch::new(
        h.temp.path().join("kill-switch.json"),
        config.state_dir.join("_kill-switch-tombstone"),
        None,
    );
    let revived = hive_supervisor::Supervisor::new(config, kill.clone()).unwrap();
    assert!(matches!(revived.restore(), Err(SupervisorError::TombstonePresent)));

    // Deactivation clears the tombstone; restore then proceeds (with
    // nothing left to revive).
    kill.deactivate().await;
    assert_eq!(revived.restore().unwrap(), 0);
}

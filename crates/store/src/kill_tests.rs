// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn switch(temp: &TempDir, with_remote: bool) -> KillSwitch {
    let remote: Option<Arc<dyn RemoteFlagStore>> = if with_remote {
        Some(Arc::new(MountedStore::new(temp.path().join("bucket"))))
    } else {
        None
    };
    if with_remote {
        std::fs::create_dir_all(temp.path().join("bucket")).unwrap();
    }
    KillSwitch::new(
        temp.path().join("kill-switch.json"),
        temp.path().join("state").join("_kill-switch-tombstone"),
        remote,
    )
}

#[tokio::test]
async fn starts_inactive() {
    let temp = TempDir::new().unwrap();
    let kill = switch(&temp, false);
    assert!(!kill.is_killed());
    assert_eq!(kill.state(), KillSwitchState::default());
}

#[tokio::test]
async fn activate_sets_all_replicas() {
    let temp = TempDir::new().unwrap();
    let kill = switch(&temp, true);

    kill.activate("operator hit the button", 123).await;

    assert!(kill.is_killed());
    assert_eq!(kill.state().reason.as_deref(), Some("operator hit the button"));
    assert_eq!(kill.state().activated_at, Some(123));
    assert!(temp.path().join("kill-switch.json").exists());
    assert!(temp.path().join("bucket/kill-switch.json").exists());
}

#[tokio::test]
async fn deactivate_clears_replicas_and_tombstone() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("state")).unwrap();
    std::fs::write(temp.path().join("state/_kill-switch-tombstone"), "x").unwrap();
    let kill = switch(&temp, true);
    kill.activate("stop", 1).await;

    kill.deactivate().await;

    assert!(!kill.is_killed());
    assert!(!temp.path().join("kill-switch.json").exists());
    assert!(!temp.path().join("bucket/kill-switch.json").exists());
    assert!(!temp.path().join("state/_kill-switch-tombstone").exists());
}

#[tokio::test]
async fn load_persisted_prefers_local_file() {
    let temp = TempDir::new().unwrap();
    let state =
        KillSwitchState { killed: true, reason: Some("local".into()), activated_at: Some(9) };
    std::fs::write(
        temp.path().join("kill-switch.json"),
        serde_json::to_vec(&state).unwrap(),
    )
    .unwrap();

    let kill = switch(&temp, false);
    kill.load_persisted().await;

    assert!(kill.is_killed());
    assert_eq!(kill.state(), state);
}

#[tokio::test]
async fn load_persisted_falls_back_to_remote() {
    let temp = TempDir::new().unwrap();
    let kill = switch(&temp, true);
    let remote = MountedStore::new(temp.path().join("bucket"));
    remote
        .put(&KillSwitchState { killed: true, reason: Some("remote".into()), activated_at: None })
        .await
        .unwrap();

    kill.load_persisted().await;

    assert!(kill.is_killed());
    assert_eq!(kill.state().reason.as_deref(), Some("remote"));
}

#[tokio::test]
async fn mounted_store_round_trips() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path()).unwrap();
    let store = MountedStore::new(temp.path());

    assert_eq!(store.fetch().await.unwrap(), None);

    let state = KillSwitchState { killed: true, reason: None, activated_at: Some(5) };
    store.put(&state).await.unwrap();
    assert_eq!(store.fetch().await.unwrap(), Some(state));

    store.remove().await.unwrap();
    assert_eq!(store.fetch().await.unwrap(), None);
}

#[tokio::test]
async fn blank_remote_file_reads_as_absent() {
    let temp = TempDir::new().unwrap();
    let store = MountedStore::new(temp.path());
    std::fs::write(temp.path().join("kill-switch.json"), "").unwrap();
    assert_eq!(store.fetch().await.unwrap(), None);
}

#[tokio::test]
async fn mark_killed_is_memory_only() {
    let temp = TempDir::new().unwrap();
    let kill = switch(&temp, false);

    kill.mark_killed("emergency", 7);

    assert!(kill.is_killed());
    assert!(!temp.path().join("kill-switch.json").exists());
}

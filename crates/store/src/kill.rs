// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kill switch: tri-source emergency stop flag.
//!
//! Three replicas of one boolean: an in-memory flag for the hot path, a
//! local file kept outside any agent workspace, and a remote copy on a
//! shared object store so sibling instances observe an activation. A
//! background poll discovers remote activations.

use async_trait::async_trait;
use hive_core::limits::KILL_POLL_INTERVAL;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Persisted shape of the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KillSwitchState {
    pub killed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<u64>,
}

/// Remote replica of the kill flag.
///
/// Implementations sit on object stores with possibly weak delete
/// semantics; `remove` is expected to apply overwrite-then-delete.
#[async_trait]
pub trait RemoteFlagStore: Send + Sync {
    async fn fetch(&self) -> std::io::Result<Option<KillSwitchState>>;
    async fn put(&self, state: &KillSwitchState) -> std::io::Result<()>;
    async fn remove(&self) -> std::io::Result<()>;
}

/// Flag store on a mounted bucket directory (FUSE or any shared volume).
pub struct MountedStore {
    path: PathBuf,
}

impl MountedStore {
    /// `root` is the mount point; the flag lives at `root/kill-switch.json`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { path: root.into().join("kill-switch.json") }
    }
}

#[async_trait]
impl RemoteFlagStore for MountedStore {
    async fn fetch(&self) -> std::io::Result<Option<KillSwitchState>> {
        let path = self.path.clone();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if content.trim().is_empty() {
            // Overwrite-then-delete leftover; treat as absent.
            return Ok(None);
        }
        Ok(serde_json::from_str(&content).ok())
    }

    async fn put(&self, state: &KillSwitchState) -> std::io::Result<()> {
        let bytes = serde_json::to_vec(state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&self.path, bytes).await
    }

    async fn remove(&self) -> std::io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(_) => {
                // Weak delete semantics: blank the file, then retry once.
                tokio::fs::write(&self.path, b"").await?;
                match tokio::fs::remove_file(&self.path).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e),
                }
            }
        }
    }
}

/// The tri-source kill switch.
#[derive(Clone)]
pub struct KillSwitch {
    killed: Arc<AtomicBool>,
    state: Arc<Mutex<KillSwitchState>>,
    local_path: PathBuf,
    tombstone_path: PathBuf,
    remote: Option<Arc<dyn RemoteFlagStore>>,
}

impl KillSwitch {
    pub fn new(
        local_path: impl Into<PathBuf>,
        tombstone_path: impl Into<PathBuf>,
        remote: Option<Arc<dyn RemoteFlagStore>>,
    ) -> Self {
        Self {
            killed: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(KillSwitchState::default())),
            local_path: local_path.into(),
            tombstone_path: tombstone_path.into(),
            remote,
        }
    }

    /// Pure in-memory check; invoked on every mutating hot path.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> KillSwitchState {
        self.state.lock().clone()
    }

    /// Set the in-memory flag only. The emergency teardown path uses this
    /// so the flag flips before any async replica write.
    pub fn mark_killed(&self, reason: &str, now_ms: u64) {
        self.killed.store(true, Ordering::Relaxed);
        *self.state.lock() = KillSwitchState {
            killed: true,
            reason: Some(reason.to_string()),
            activated_at: Some(now_ms),
        };
    }

    /// Activate: memory, then local file, then remote (best effort).
    pub async fn activate(&self, reason: &str, now_ms: u64) {
        self.mark_killed(reason, now_ms);
        let state = self.state();

        if let Some(parent) = self.local_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        match serde_json::to_vec(&state) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&self.local_path, bytes).await {
                    tracing::warn!(error = %e, "kill-switch local write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "kill-switch serialize failed"),
        }

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.put(&state).await {
                tracing::warn!(error = %e, "kill-switch remote upload failed");
            }
        }
        tracing::error!(reason, "kill switch activated");
    }

    /// Clear all three replicas and the tombstone.
    pub async fn deactivate(&self) {
        self.killed.store(false, Ordering::Relaxed);
        *self.state.lock() = KillSwitchState::default();

        let _ = tokio::fs::remove_file(&self.local_path).await;
        let _ = tokio::fs::remove_file(&self.tombstone_path).await;
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.remove().await {
                tracing::warn!(error = %e, "kill-switch remote clear failed");
            }
        }
        tracing::info!("kill switch deactivated");
    }

    /// Startup load: local file first, else one remote fetch.
    pub async fn load_persisted(&self) {
        if let Ok(content) = tokio::fs::read_to_string(&self.local_path).await {
            if let Ok(state) = serde_json::from_str::<KillSwitchState>(&content) {
                if state.killed {
                    tracing::warn!(reason = ?state.reason, "kill switch restored from local file");
                    self.killed.store(true, Ordering::Relaxed);
                    *self.state.lock() = state;
                    return;
                }
            }
        }

        if let Some(remote) = &self.remote {
            match remote.fetch().await {
                Ok(Some(state)) if state.killed => {
                    tracing::warn!(reason = ?state.reason, "kill switch restored from remote");
                    self.killed.store(true, Ordering::Relaxed);
                    *self.state.lock() = state;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "kill-switch remote load failed"),
            }
        }
    }

    /// Poll the remote replica every 10 s; on a discovered activation, set
    /// the in-memory flag and invoke the callback once.
    pub fn spawn_poll<F>(&self, cancel: CancellationToken, on_remote_activation: F)
    where
        F: Fn(KillSwitchState) + Send + Sync + 'static,
    {
        let Some(remote) = self.remote.clone() else {
            return;
        };
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KILL_POLL_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if this.is_killed() {
                    continue;
                }
                match remote.fetch().await {
                    Ok(Some(state)) if state.killed => {
                        tracing::error!(reason = ?state.reason, "remote kill-switch activation discovered");
                        this.killed.store(true, Ordering::Relaxed);
                        *this.state.lock() = state.clone();
                        on_remote_activation(state);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "kill-switch remote poll failed"),
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "kill_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, sweeps, shutdown.

mod startup;
mod sweep;

pub use startup::startup;

use hive_bus::MessageBus;
use hive_core::limits::FATAL_ERROR_BUDGET;
use hive_orchestrator::Orchestrator;
use hive_store::KillSwitch;
use hive_supervisor::Supervisor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Filesystem layout and knobs for one daemon instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root under which everything else lives.
    pub root: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub logs_dir: PathBuf,
    pub supervisor: hive_supervisor::SupervisorConfig,
    pub object_store_dir: Option<PathBuf>,
    pub assignment_interval: std::time::Duration,
    pub delivery_settle_ms: u64,
}

impl Config {
    /// Standard layout under one root.
    pub fn under_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut supervisor = hive_supervisor::SupervisorConfig::under_root(&root);
        supervisor.agent_bin = crate::env::agent_bin();
        Self {
            lock_path: root.join("hived.lock"),
            version_path: root.join("hived.version"),
            logs_dir: root.join("logs"),
            supervisor,
            object_store_dir: None,
            assignment_interval: hive_orchestrator::ASSIGNMENT_INTERVAL,
            delivery_settle_ms: 250,
            root,
        }
    }

    /// Full environment-driven configuration.
    pub fn from_env() -> Result<Self, LifecycleError> {
        let root = crate::env::state_dir()?;
        let mut config = Self::under_root(root);
        config.supervisor.limits = crate::env::limits();
        config.supervisor.shared_context_dir = crate::env::shared_context_dir();
        config.supervisor.repos_dir = crate::env::repos_dir();
        config.supervisor.sweep_untracked_on_emergency = crate::env::containerized();
        config.object_store_dir = crate::env::object_store_dir();
        config.assignment_interval = crate::env::assignment_interval();
        config.delivery_settle_ms = config.supervisor.limits.delivery_settle_ms;
        Ok(config)
    }

    /// The kill switch's local file, outside every agent workspace.
    pub fn kill_switch_path(&self) -> PathBuf {
        self.root.join("kill-switch.json")
    }

    pub fn tombstone_path(&self) -> PathBuf {
        self.supervisor.state_dir.join(hive_store::TOMBSTONE_FILE)
    }
}

/// Errors that can stop the daemon from starting.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another daemon holds the lock: {0}")]
    LockFailed(std::io::Error),
    #[error("no usable state directory (set HIVE_STATE_DIR)")]
    NoStateDir,
    #[error("supervisor error: {0}")]
    Supervisor(#[from] hive_supervisor::SupervisorError),
}

/// A running daemon's handles.
pub struct Daemon {
    pub config: Config,
    pub supervisor: Supervisor,
    pub orchestrator: Arc<Orchestrator>,
    pub bus: MessageBus,
    pub kill: KillSwitch,
    pub cancel: CancellationToken,
    fatal_count: AtomicU32,
    // Held for the daemon's lifetime; dropping releases the flock.
    _lock_file: std::fs::File,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon").finish_non_exhaustive()
    }
}

impl Daemon {
    pub(crate) fn new(
        config: Config,
        supervisor: Supervisor,
        orchestrator: Arc<Orchestrator>,
        bus: MessageBus,
        kill: KillSwitch,
        cancel: CancellationToken,
        lock_file: std::fs::File,
    ) -> Self {
        Self {
            config,
            supervisor,
            orchestrator,
            bus,
            kill,
            cancel,
            fatal_count: AtomicU32::new(0),
            _lock_file: lock_file,
        }
    }

    /// Host-facing kill switch activation: flag, replicas, nuclear
    /// teardown, credential rotation.
    pub async fn activate_kill_switch(&self, reason: &str) {
        self.kill.activate(reason, hive_core::Clock::epoch_ms(&hive_core::SystemClock)).await;
        self.supervisor.emergency_destroy_all(reason);
        self.supervisor.token_source().rotate();
    }

    /// Count an uncaught internal error. Returns true when the budget is
    /// spent and the process should exit after [`Daemon::emergency_exit`].
    pub fn report_fatal(&self, error: &str) -> bool {
        let count = self.fatal_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::error!(count, error, "uncaught internal error");
        count >= FATAL_ERROR_BUDGET
    }

    /// The fatal path: tombstone via emergency teardown, then the caller
    /// force-exits so an outer supervisor restarts with a clean slate.
    pub fn emergency_exit(&self, reason: &str) {
        self.supervisor.emergency_destroy_all(reason);
        self.supervisor.token_source().rotate();
    }

    /// Ordered graceful shutdown. State files survive for restoration.
    pub async fn shutdown(self) {
        tracing::info!("shutting down");
        self.orchestrator.stop();
        self.cancel.cancel();
        self.supervisor.dispose().await;
        let _ = std::fs::remove_file(&self.config.version_path);
        let _ = std::fs::remove_file(&self.config.lock_path);
        tracing::info!("shutdown complete");
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

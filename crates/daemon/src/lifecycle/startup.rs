// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: lock, restore, sweep, wire, go.

use super::{sweep, Config, Daemon, LifecycleError};
use fs2::FileExt;
use hive_bus::MessageBus;
use hive_core::{Clock, SystemClock};
use hive_graph::TaskGraph;
use hive_orchestrator::{AgentHost, AutoDelivery, Orchestrator};
use hive_store::{KillSwitch, MountedStore, RemoteFlagStore};
use hive_supervisor::{Supervisor, SupervisorError};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Start the daemon.
pub async fn startup(config: Config) -> Result<Daemon, LifecycleError> {
    match startup_inner(config).await {
        Ok(daemon) => Ok(daemon),
        Err((config, e)) => {
            // Don't clean up after a lock failure; those files belong to
            // the daemon that holds the lock.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: Config) -> Result<Daemon, (Config, LifecycleError)> {
    match startup_steps(&config).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => Err((config, e)),
    }
}

async fn startup_steps(config: &Config) -> Result<Daemon, LifecycleError> {
    // 1. Root directory, then the exclusive lock before anything else.
    std::fs::create_dir_all(&config.root)?;
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    // Write our pid now that we hold the lock.
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::create_dir_all(&config.logs_dir)?;
    std::fs::write(&config.version_path, crate::env::VERSION)?;

    // 2. Kill switch: local file first, one remote fetch as fallback.
    let remote: Option<Arc<dyn RemoteFlagStore>> = config
        .object_store_dir
        .as_ref()
        .map(|dir| Arc::new(MountedStore::new(dir)) as Arc<dyn RemoteFlagStore>);
    let kill = KillSwitch::new(config.kill_switch_path(), config.tombstone_path(), remote);
    kill.load_persisted().await;
    if kill.is_killed() {
        warn!(reason = ?kill.state().reason, "starting with the kill switch active");
    }

    // 3. Supervisor and restoration.
    let supervisor = Supervisor::new(config.supervisor.clone(), kill.clone())?;
    match supervisor.restore() {
        Ok(count) if count > 0 => info!(count, "restored agents from disk"),
        Ok(_) => info!("no agents to restore"),
        Err(SupervisorError::TombstonePresent) => {
            warn!("tombstone present; agents will not be restored until the kill switch clears")
        }
        Err(e) => return Err(e.into()),
    }

    // 4. Orphan processes and stale workspaces left by a crash.
    sweep::kill_orphan_agent_processes(&supervisor);
    sweep::prune_stale_workspaces(&supervisor);

    // 5. Periodic supervisor loops (watchdog, flush, TTL sweep, tokens).
    supervisor.spawn_periodic_tasks();

    // 6. Bus, graph, orchestrator, auto-delivery.
    let bus = MessageBus::new(|| SystemClock.epoch_ms());
    let graph = TaskGraph::new();
    let host: Arc<dyn AgentHost> = Arc::new(supervisor.clone());
    let orchestrator =
        Orchestrator::new(graph, bus.clone(), Arc::clone(&host), SystemClock);
    orchestrator.start(config.assignment_interval);

    let cancel = CancellationToken::new();
    AutoDelivery::spawn(bus.clone(), host, config.delivery_settle_ms, cancel.clone());

    // 7. Remote kill-switch poll: a discovered activation triggers the
    // nuclear teardown and credential rotation.
    {
        let sup = supervisor.clone();
        kill.spawn_poll(cancel.clone(), move |state| {
            let reason = state.reason.unwrap_or_else(|| "remote activation".to_string());
            sup.emergency_destroy_all(&reason);
            sup.token_source().rotate();
        });
    }

    info!(version = crate::env::VERSION, root = %config.root.display(), "daemon started");
    Ok(Daemon::new(
        config.clone(),
        supervisor,
        orchestrator,
        bus,
        kill,
        cancel,
        lock_file,
    ))
}

/// Remove files we created if startup failed partway.
fn cleanup_on_failure(config: &Config) {
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent state files.
//!
//! One JSON file per agent under the state directory, written atomically via
//! temp file + rename. Meaningful status transitions write immediately;
//! everything else coalesces on a per-agent debounce timer. The directory
//! also hosts the kill-switch tombstone consulted by the restore path.

use crate::StoreError;
use hive_core::limits::STATE_DEBOUNCE;
use hive_core::{Agent, AgentId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Presence of this file under the state directory refuses restoration.
pub const TOMBSTONE_FILE: &str = "_kill-switch-tombstone";

/// Durable store for agent records.
#[derive(Clone)]
pub struct StateStore {
    dir: PathBuf,
    pending: Arc<Mutex<HashMap<AgentId, Agent>>>,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, pending: Arc::new(Mutex::new(HashMap::new())) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, id: &AgentId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn temp_path(&self, id: &AgentId) -> PathBuf {
        self.dir.join(format!("{id}.json.tmp"))
    }

    fn tombstone_path(&self) -> PathBuf {
        self.dir.join(TOMBSTONE_FILE)
    }

    /// Save an agent record.
    ///
    /// `meaningful` transitions (idle/running/error) write through
    /// immediately; other saves coalesce on a 500 ms per-agent timer. Write
    /// failures are logged and absorbed.
    pub fn save(&self, agent: &Agent, meaningful: bool) {
        if meaningful {
            self.pending.lock().remove(&agent.id);
            if let Err(e) = self.write_atomic(agent) {
                tracing::warn!(agent_id = %agent.id, error = %e, "state write failed");
            }
            return;
        }

        let arm_timer = {
            let mut pending = self.pending.lock();
            let first = !pending.contains_key(&agent.id);
            pending.insert(agent.id.clone(), agent.clone());
            first
        };
        if arm_timer {
            let store = self.clone();
            let id = agent.id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(STATE_DEBOUNCE).await;
                store.flush_one(&id);
            });
        }
    }

    /// Write a pending debounced record, if any.
    pub fn flush_one(&self, id: &AgentId) {
        let agent = self.pending.lock().remove(id);
        if let Some(agent) = agent {
            if let Err(e) = self.write_atomic(&agent) {
                tracing::warn!(agent_id = %id, error = %e, "debounced state write failed");
            }
        }
    }

    /// Write every pending debounced record.
    pub fn flush_all(&self) {
        let drained: Vec<Agent> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, a)| a).collect()
        };
        for agent in drained {
            if let Err(e) = self.write_atomic(&agent) {
                tracing::warn!(agent_id = %agent.id, error = %e, "state flush failed");
            }
        }
    }

    fn write_atomic(&self, agent: &Agent) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(agent)?;
        let temp = self.temp_path(&agent.id);
        std::fs::write(&temp, &bytes)?;
        std::fs::rename(&temp, self.state_path(&agent.id))?;
        Ok(())
    }

    /// Load every valid state file.
    ///
    /// Empty or unparsable files are crash artifacts: removed and skipped.
    /// Returns nothing when the tombstone is present.
    pub fn load_all(&self) -> Result<Vec<Agent>, StoreError> {
        if self.has_tombstone() {
            tracing::warn!("kill-switch tombstone present, refusing to load agent state");
            return Ok(Vec::new());
        }

        let mut agents = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable state file");
                    continue;
                }
            };
            if content.trim().is_empty() {
                tracing::warn!(path = %path.display(), "removing empty state file");
                let _ = std::fs::remove_file(&path);
                continue;
            }
            match serde_json::from_str::<Agent>(&content) {
                Ok(agent) => agents.push(agent),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "removing partial state file");
                    let _ = std::fs::remove_file(&path);
                }
            }
        }
        Ok(agents)
    }

    /// Remove an agent's state file and temp file.
    ///
    /// The backing volume may have weak delete semantics; on failure the
    /// file is overwritten with empty content and the delete retried once.
    pub fn remove(&self, id: &AgentId) {
        self.pending.lock().remove(id);
        let _ = std::fs::remove_file(self.temp_path(id));

        let path = self.state_path(id);
        if !path.exists() {
            return;
        }
        if std::fs::remove_file(&path).is_ok() {
            return;
        }
        // Overwrite-then-delete for eventually-consistent mounts.
        let _ = std::fs::write(&path, b"");
        if std::fs::remove_file(&path).is_err() && path.exists() {
            tracing::warn!(agent_id = %id, path = %path.display(), "state file survived delete retry");
        }
    }

    pub fn write_tombstone(&self, reason: &str) {
        if let Err(e) = std::fs::write(self.tombstone_path(), reason) {
            tracing::warn!(error = %e, "tombstone write failed");
        }
    }

    pub fn has_tombstone(&self) -> bool {
        self.tombstone_path().exists()
    }

    pub fn clear_tombstone(&self) {
        let _ = std::fs::remove_file(self.tombstone_path());
    }

    /// Purge orphaned temp files and event logs whose state file is gone.
    pub fn cleanup_stale(&self, events_dir: &Path) {
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.to_string_lossy().ends_with(".json.tmp") {
                    tracing::info!(path = %path.display(), "removing orphaned temp file");
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        let Ok(entries) = std::fs::read_dir(events_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.state_path(&AgentId::new(stem)).exists() {
                tracing::info!(path = %path.display(), "removing orphaned event log");
                let _ = std::fs::remove_file(&path);
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-agent event logs.
//!
//! One JSONL file per agent. Lines arrive already sanitized and serialized
//! from the supervisor's per-agent write queue, which is the only writer, so
//! appends here never interleave. Logs are truncated to the newest
//! `MAX_PERSISTED_EVENTS` lines once they exceed `TRUNCATE_THRESHOLD`.

use hive_core::limits::{MAX_PERSISTED_EVENTS, TRUNCATE_THRESHOLD};
use hive_core::{AgentId, StreamEvent};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Store for per-agent JSONL event logs.
#[derive(Clone)]
pub struct EventLog {
    dir: PathBuf,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, id: &AgentId) -> PathBuf {
        self.dir.join(format!("{id}.jsonl"))
    }

    /// Append serialized event lines in order.
    pub fn append(&self, id: &AgentId, lines: &[String]) -> std::io::Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut file =
            std::fs::OpenOptions::new().create(true).append(true).open(self.path(id))?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Truncate to the newest lines when the log has grown past the
    /// threshold. Called from the write queue after appends.
    pub fn maybe_truncate(&self, id: &AgentId) -> std::io::Result<()> {
        let path = self.path(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let lines: Vec<&str> = content.lines().collect();
        if lines.len() <= TRUNCATE_THRESHOLD {
            return Ok(());
        }

        let keep = &lines[lines.len() - MAX_PERSISTED_EVENTS..];
        let temp = self.dir.join(format!("{id}.jsonl.tmp"));
        {
            let mut file = std::fs::File::create(&temp)?;
            for line in keep {
                writeln!(file, "{line}")?;
            }
        }
        std::fs::rename(&temp, &path)?;
        tracing::info!(agent_id = %id, kept = keep.len(), dropped = lines.len() - keep.len(), "event log truncated");
        Ok(())
    }

    /// Replay the full log in arrival order. Blank lines are skipped;
    /// anything unparsable surfaces as a `raw` event, same as live parsing.
    pub fn read(&self, id: &AgentId) -> std::io::Result<Vec<StreamEvent>> {
        let content = match std::fs::read_to_string(self.path(id)) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content.lines().filter(|l| !l.trim().is_empty()).map(StreamEvent::parse_line).collect())
    }

    pub fn remove(&self, id: &AgentId) {
        let _ = std::fs::remove_file(self.path(id));
        let _ = std::fs::remove_file(self.dir.join(format!("{id}.jsonl.tmp")));
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

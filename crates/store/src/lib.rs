// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable state for the orchestration daemon.
//!
//! Three concerns: per-agent state files (atomic write, debounced),
//! append-only per-agent event logs with truncation, and the kill switch
//! with its local/remote replicas and restart tombstone.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod kill;
pub mod state;

pub use events::EventLog;
pub use kill::{KillSwitch, KillSwitchState, MountedStore, RemoteFlagStore};
pub use state::{StateStore, TOMBSTONE_FILE};

use thiserror::Error;

/// Errors surfaced by load paths. Write paths absorb transient I/O failures
/// with a warning instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

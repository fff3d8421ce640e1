// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle supervisor.
//!
//! Owns the child processes: spawn and attach, stream ingestion with
//! backpressure and batching, the per-agent ring buffer and durable event
//! log, delivery gating, the watchdog, restoration after restart, and the
//! graceful and emergency teardown paths.
//!
//! Concurrency model: all mutable state lives behind one mutex that is
//! never held across an await. Per-agent write queues and child processes
//! are the only parallelism. `message` and `destroy` serialize through a
//! per-agent lifecycle lock.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod attachments;
mod config;
mod envs;
mod error;
mod ingest;
mod pricing;
mod proc;
mod signal;
mod spawn;
mod supervisor;
mod watchdog;
mod workspace;
mod writer;

pub use attachments::Attachment;
pub use config::{SupervisorConfig, TokenSource};
pub use error::SupervisorError;
pub use pricing::{default_model, is_allowed_model, resolve_model};
pub use supervisor::{AgentSummary, CreateSpec, Supervisor};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: goal decomposition, task assignment, auto-delivery.
//!
//! Pairs unblocked tasks with capable idle agents, routes assignments as
//! `task` messages over the bus, folds results back into the graph with
//! retry semantics, and escalates high-risk confidence grades. The
//! auto-delivery glue pushes pending bus messages into an agent's next
//! turn on post and on idle transitions.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod delivery;
mod error;
mod events;
mod host;
mod orchestrator;

pub use delivery::AutoDelivery;
pub use error::OrchestratorError;
pub use events::OrchestratorEvent;
pub use host::AgentHost;
pub use orchestrator::{
    DecomposeSpec, Orchestrator, ResultSubmission, SubmitOutcome, SubmitStatus, SubtaskSpec,
    ASSIGNMENT_INTERVAL, ORCHESTRATOR_ID,
};

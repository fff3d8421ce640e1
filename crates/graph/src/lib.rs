// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task graph: a DAG of versioned tasks with capability-based selection.
//!
//! Tasks are created against existing dependencies only, so the graph is
//! acyclic by construction. Mutations use optimistic concurrency: callers
//! present the version they observed and conflicts reject without mutating.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod graph;
mod profile;
mod spec;

pub use error::GraphError;
pub use graph::{CompletionOutcome, GraphSummary, TaskGraph};
pub use profile::{MAX_PROFILE_TAGS, MAX_TAG_LEN};
pub use spec::{TaskQuery, TaskSpec};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hive_core::{TaskId, TaskStatus};
use thiserror::Error;

/// Rejections from task-graph operations. None of these mutate state.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("version conflict on {id}: expected {expected}, actual {actual}")]
    VersionConflict { id: TaskId, expected: u64, actual: u64 },
    #[error("invalid priority {0} (expected 0..=4)")]
    InvalidPriority(u8),
    #[error("unknown dependency: {0}")]
    UnknownDependency(TaskId),
    #[error("task cannot depend on itself")]
    SelfDependency,
    #[error("{field} exceeds {max} chars")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("{field} exceeds {max} entries")]
    TooManyEntries { field: &'static str, max: usize },
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition { id: TaskId, from: TaskStatus, to: TaskStatus },
    #[error("retries exhausted for {id} ({retry_count})")]
    RetriesExhausted { id: TaskId, retry_count: u32 },
    #[error("confidence for {tag:?} out of range: {value}")]
    ConfidenceOutOfRange { tag: String, value: f64 },
}

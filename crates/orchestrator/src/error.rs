// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hive_core::TaskId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("graph error: {0}")]
    Graph(#[from] hive_graph::GraphError),
    #[error("invalid grade: {0}")]
    Grade(#[from] hive_core::GradeError),
    #[error("decomposition needs at least one subtask")]
    EmptyDecomposition,
    #[error("too many subtasks ({got}, max {max})")]
    TooManySubtasks { got: usize, max: usize },
    #[error("subtask {task_index} has invalid dependency index {dep_index}")]
    InvalidDependencyIndex { task_index: usize, dep_index: usize },
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hive core types
//!
//! Shared vocabulary for the orchestration daemon: identifiers, the clock
//! abstraction, resource limits, stream events emitted by agent child
//! processes, the persisted agent record, inter-agent messages, the task
//! graph data model, and confidence grades.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod agent;
pub mod clock;
pub mod event;
pub mod grade;
pub mod id;
pub mod limits;
pub mod message;
pub mod sanitize;
pub mod task;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{Agent, AgentStatus, UsageTotals};
pub use clock::{Clock, SystemClock};
pub use event::{AssistantMessage, ContentBlock, StreamEvent, Usage};
pub use grade::{Axis, BlastRadius, Clarity, Confidence, Grade, GradeError, Risk};
pub use id::{AgentId, MessageId, TaskId};
pub use limits::Limits;
pub use message::{Message, MessageType};
pub use sanitize::sanitize_line;
pub use task::{CapabilityProfile, Task, TaskStatus};

#[cfg(any(test, feature = "test-support"))]
pub use test_support::FakeClock;

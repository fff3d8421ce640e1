// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream events emitted by agent child processes.
//!
//! The child writes one JSON event per stdout line. Variants carry the
//! fields the supervisor consumes; everything else is preserved through a
//! flattened remainder map so persisted logs replay byte-equivalent
//! semantics. Lines that do not parse, and events of unknown type, are
//! downgraded to [`StreamEvent::Raw`] rather than disturbing the stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event on an agent's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Control events from the CLI; `init` carries the session id.
    System {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(flatten)]
        rest: Map<String, Value>,
    },
    /// Synthetic record of the prompt that started a turn. Never emitted by
    /// the child; recorded so reconnecting subscribers see the original
    /// prompt.
    UserPrompt { text: String },
    /// Assistant output with nested content blocks and usage.
    Assistant {
        message: AssistantMessage,
        #[serde(flatten)]
        rest: Map<String, Value>,
    },
    /// User-side turn content (tool results fed back to the model).
    User {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<Value>,
        #[serde(flatten)]
        rest: Map<String, Value>,
    },
    /// Final turn summary.
    Result {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subtype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        num_turns: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        #[serde(flatten)]
        rest: Map<String, Value>,
    },
    /// A stderr line that did not match the noise allowlist.
    Stderr { text: String },
    /// A stdout line that was not valid JSON, or an unknown event type.
    Raw { text: String },
    /// Synthetic: the child process closed with this exit code.
    Done { exit_code: i32 },
    /// Synthetic: the agent was destroyed; terminal for all subscribers.
    Destroyed,
}

/// Nested assistant message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AssistantMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One block inside a message's `content` array.
///
/// Kept as a struct keyed by `type` rather than an enum so unknown block
/// kinds pass through losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ContentBlock {
    /// True for block kinds that indicate the assistant is making progress.
    pub fn is_progress(&self) -> bool {
        self.kind == "text" || self.kind == "tool_use"
    }
}

/// Token usage as reported by the model API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    /// Total input-side tokens (fresh + cache creation + cache read).
    pub fn tokens_in(&self) -> u64 {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }
}

impl StreamEvent {
    /// Parse one stdout line. Invalid JSON and unknown event types become
    /// [`StreamEvent::Raw`].
    pub fn parse_line(line: &str) -> StreamEvent {
        serde_json::from_str(line).unwrap_or_else(|_| StreamEvent::Raw { text: line.to_string() })
    }

    /// Serialize to a single JSONL line.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"type\":\"raw\",\"text\":\"\"}".into())
    }

    /// The session id carried by a `system`/`init` event, if any.
    pub fn init_session_id(&self) -> Option<&str> {
        match self {
            StreamEvent::System { subtype, session_id, .. }
                if subtype.as_deref() == Some("init") =>
            {
                session_id.as_deref()
            }
            _ => None,
        }
    }

    /// Synthetic system event injected into an agent's stream
    /// (watchdog notices, pause/resume markers).
    pub fn system_note(subtype: impl Into<String>, text: impl Into<String>) -> StreamEvent {
        let mut rest = Map::new();
        rest.insert("text".into(), Value::String(text.into()));
        StreamEvent::System { subtype: Some(subtype.into()), session_id: None, rest }
    }

    /// Synthetic watchdog notice injected into an agent's stream.
    pub fn watchdog(text: impl Into<String>) -> StreamEvent {
        Self::system_note("watchdog", text)
    }

    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::System { .. } => "system",
            StreamEvent::UserPrompt { .. } => "user_prompt",
            StreamEvent::Assistant { .. } => "assistant",
            StreamEvent::User { .. } => "user",
            StreamEvent::Result { .. } => "result",
            StreamEvent::Stderr { .. } => "stderr",
            StreamEvent::Raw { .. } => "raw",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Destroyed => "destroyed",
        }
    }
}

/// stderr noise allowlist: startup warnings from the CLI runtime that are
/// dropped instead of becoming `stderr` events.
pub fn is_stderr_noise(line: &str) -> bool {
    line.is_empty()
        || line.starts_with("(node:")
        || line.contains("ExperimentalWarning")
        || line.contains("DeprecationWarning")
        || line.contains("punycode")
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

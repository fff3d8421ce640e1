// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret stripping for events bound for disk or subscribers.
//!
//! Operates on serialized JSON text. Replacement text contains no quotes or
//! backslashes so sanitized lines stay valid JSON.

use once_cell::sync::Lazy;
use regex::Regex;

const REDACTED: &str = "[REDACTED]";

static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Anthropic API keys
        r"sk-ant-[A-Za-z0-9_\-]{8,}",
        // Authorization headers
        r"Bearer [A-Za-z0-9._~+/\-]{8,}=*",
        // GitHub tokens (classic and fine-grained)
        r"ghp_[A-Za-z0-9]{20,}",
        r"github_pat_[A-Za-z0-9_]{20,}",
        // AWS access key ids
        r"AKIA[0-9A-Z]{16}",
        // Service token assignments leaked into command output
        r"HIVE_AGENT_TOKEN=[A-Za-z0-9._\-]+",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Replace known secret patterns in a serialized event line.
pub fn sanitize_line(line: &str) -> String {
    let mut out = std::borrow::Cow::Borrowed(line);
    for pattern in PATTERNS.iter() {
        if pattern.is_match(&out) {
            out = std::borrow::Cow::Owned(pattern.replace_all(&out, REDACTED).into_owned());
        }
    }
    out.into_owned()
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;

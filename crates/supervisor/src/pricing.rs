// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model allowlist and cost estimation.
//!
//! Prices are USD per million tokens. Cache reads are billed at a tenth of
//! the input rate; cache creation at the input rate.

use hive_core::Usage;

/// (model id, input $/Mtok, output $/Mtok)
const PRICES: &[(&str, f64, f64)] = &[
    ("claude-opus-4-1", 15.0, 75.0),
    ("claude-sonnet-4-5", 3.0, 15.0),
    ("claude-haiku-4-5", 1.0, 5.0),
];

pub fn default_model() -> &'static str {
    "claude-sonnet-4-5"
}

pub fn is_allowed_model(model: &str) -> bool {
    PRICES.iter().any(|(id, _, _)| *id == model)
}

/// Resolve a requested model against the allowlist, falling back to the
/// default for unknown ids.
pub fn resolve_model(requested: Option<&str>) -> String {
    match requested {
        Some(model) if is_allowed_model(model) => model.to_string(),
        Some(model) => {
            tracing::warn!(model, fallback = default_model(), "unknown model, using default");
            default_model().to_string()
        }
        None => default_model().to_string(),
    }
}

/// Estimate the USD cost of one assistant message.
pub fn estimate_cost(model: &str, usage: &Usage) -> f64 {
    let (_, input_rate, output_rate) = PRICES
        .iter()
        .find(|(id, _, _)| *id == model)
        .copied()
        .unwrap_or(("", 3.0, 15.0));

    let fresh = (usage.input_tokens + usage.cache_creation_input_tokens) as f64;
    let cached = usage.cache_read_input_tokens as f64;
    let out = usage.output_tokens as f64;
    (fresh * input_rate + cached * input_rate * 0.1 + out * output_rate) / 1_000_000.0
}

#[cfg(test)]
#[path = "pricing_tests.rs"]
mod tests;

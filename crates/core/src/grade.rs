// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confidence grades: per-task self-assessment and risk classification.
//!
//! Three ordinal axes, each scored 0 (best) to 2 (worst). The summed score
//! maps to a risk band, with a floor of `medium` whenever any single axis
//! sits at its worst value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted `reasoning` text.
pub const MAX_REASONING_LEN: usize = 5000;

/// Which axis a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Clarity,
    Confidence,
    BlastRadius,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Axis::Clarity => "clarity",
            Axis::Confidence => "confidence",
            Axis::BlastRadius => "blastRadius",
        };
        write!(f, "{s}")
    }
}

/// Errors rejecting an invalid grade submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GradeError {
    #[error("unknown {axis} label: {value:?}")]
    UnknownLabel { axis: Axis, value: String },
    #[error("reasoning exceeds {MAX_REASONING_LEN} chars ({len})")]
    ReasoningTooLong { len: usize },
}

/// How well the task's requirements were understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clarity {
    High,
    Medium,
    Low,
}

/// How confident the agent is in its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// How far a wrong result would reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlastRadius {
    Isolated,
    Moderate,
    Wide,
}

impl Clarity {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    fn score(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl Confidence {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    fn score(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl BlastRadius {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "isolated" => Some(Self::Isolated),
            "moderate" => Some(Self::Moderate),
            "wide" => Some(Self::Wide),
            _ => None,
        }
    }

    fn score(self) -> u8 {
        match self {
            Self::Isolated => 0,
            Self::Moderate => 1,
            Self::Wide => 2,
        }
    }
}

/// Derived risk band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
        };
        write!(f, "{s}")
    }
}

/// A validated self-assessment for a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub clarity: Clarity,
    pub confidence: Confidence,
    pub blast_radius: BlastRadius,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Grade {
    /// Validate raw axis labels into a grade.
    pub fn parse(
        clarity: &str,
        confidence: &str,
        blast_radius: &str,
        reasoning: Option<String>,
    ) -> Result<Grade, GradeError> {
        let clarity = Clarity::parse(clarity).ok_or_else(|| GradeError::UnknownLabel {
            axis: Axis::Clarity,
            value: clarity.to_string(),
        })?;
        let confidence = Confidence::parse(confidence).ok_or_else(|| GradeError::UnknownLabel {
            axis: Axis::Confidence,
            value: confidence.to_string(),
        })?;
        let blast_radius =
            BlastRadius::parse(blast_radius).ok_or_else(|| GradeError::UnknownLabel {
                axis: Axis::BlastRadius,
                value: blast_radius.to_string(),
            })?;
        if let Some(ref r) = reasoning {
            if r.chars().count() > MAX_REASONING_LEN {
                return Err(GradeError::ReasoningTooLong { len: r.chars().count() });
            }
        }
        Ok(Grade { clarity, confidence, blast_radius, reasoning })
    }

    /// Summed axis score, 0..=6.
    pub fn score(&self) -> u8 {
        self.clarity.score() + self.confidence.score() + self.blast_radius.score()
    }

    /// Risk classification with the worst-axis floor.
    pub fn risk(&self) -> Risk {
        let worst_axis = self.clarity.score() == 2
            || self.confidence.score() == 2
            || self.blast_radius.score() == 2;
        let banded = match self.score() {
            0..=1 => Risk::Low,
            2..=3 => Risk::Medium,
            _ => Risk::High,
        };
        if worst_axis && banded == Risk::Low {
            Risk::Medium
        } else {
            banded
        }
    }
}

#[cfg(test)]
#[path = "grade_tests.rs"]
mod tests;

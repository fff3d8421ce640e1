// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confidence grading specs.

use hive_core::{Grade, GradeError, Risk};

#[test]
fn best_grades_are_low_risk() {
    let grade = Grade::parse("high", "high", "isolated", None).unwrap();
    assert_eq!(grade.risk(), Risk::Low);
}

#[test]
fn worst_axis_forces_at_least_medium() {
    let grade = Grade::parse("low", "high", "isolated", None).unwrap();
    assert_eq!(grade.risk(), Risk::Medium);
}

#[test]
fn score_five_is_high_risk() {
    let grade = Grade::parse("low", "low", "moderate", None).unwrap();
    assert_eq!(grade.score(), 5);
    assert_eq!(grade.risk(), Risk::High);
}

#[test]
fn unknown_axis_labels_are_rejected() {
    assert!(matches!(
        Grade::parse("high", "high", "galactic", None),
        Err(GradeError::UnknownLabel { .. })
    ));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_core::limits::{MAX_PERSISTED_EVENTS, TRUNCATE_THRESHOLD};
use tempfile::TempDir;

fn log() -> (TempDir, EventLog, AgentId) {
    let temp = TempDir::new().unwrap();
    let log = EventLog::new(temp.path().join("events")).unwrap();
    (temp, log, AgentId::new("a-1"))
}

fn event_line(n: usize) -> String {
    StreamEvent::UserPrompt { text: format!("event {n}") }.to_json_line()
}

#[test]
fn append_then_read_preserves_order() {
    let (_temp, log, id) = log();
    let lines: Vec<String> = (0..5).map(event_line).collect();
    log.append(&id, &lines).unwrap();

    let events = log.read(&id).unwrap();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0], StreamEvent::UserPrompt { text: "event 0".into() });
    assert_eq!(events[4], StreamEvent::UserPrompt { text: "event 4".into() });
}

#[test]
fn read_missing_log_is_empty() {
    let (_temp, log, id) = log();
    assert!(log.read(&id).unwrap().is_empty());
}

#[test]
fn unparsable_lines_replay_as_raw() {
    let (_temp, log, id) = log();
    log.append(&id, &[event_line(0), "garbage line".to_string()]).unwrap();

    let events = log.read(&id).unwrap();
    assert_eq!(events[1], StreamEvent::Raw { text: "garbage line".into() });
}

#[test]
fn truncation_keeps_newest_lines() {
    let (_temp, log, id) = log();
    let lines: Vec<String> = (0..TRUNCATE_THRESHOLD + 1).map(event_line).collect();
    log.append(&id, &lines).unwrap();
    log.maybe_truncate(&id).unwrap();

    let events = log.read(&id).unwrap();
    assert_eq!(events.len(), MAX_PERSISTED_EVENTS);
    let first = TRUNCATE_THRESHOLD + 1 - MAX_PERSISTED_EVENTS;
    assert_eq!(events[0], StreamEvent::UserPrompt { text: format!("event {first}") });
    assert_eq!(
        events[MAX_PERSISTED_EVENTS - 1],
        StreamEvent::UserPrompt { text: format!("event {}", TRUNCATE_THRESHOLD) }
    );
}

#[test]
fn truncation_is_noop_below_threshold() {
    let (_temp, log, id) = log();
    let lines: Vec<String> = (0..100).map(event_line).collect();
    log.append(&id, &lines).unwrap();
    log.maybe_truncate(&id).unwrap();
    assert_eq!(log.read(&id).unwrap().len(), 100);
}

#[test]
fn remove_deletes_log() {
    let (_temp, log, id) = log();
    log.append(&id, &[event_line(0)]).unwrap();
    log.remove(&id);
    assert!(!log.path(&id).exists());
}

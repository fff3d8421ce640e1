// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn message(to: Option<&str>) -> Message {
    Message {
        id: MessageId::new("m-1"),
        from: AgentId::new("sender"),
        from_name: Some("alpha".into()),
        to: to.map(AgentId::new),
        kind: MessageType::Info,
        content: "hello".into(),
        channel: None,
        exclude_roles: None,
        metadata: None,
        created_at: 1000,
        read_by: HashSet::new(),
    }
}

#[test]
fn targeted_message_visible_only_to_addressee() {
    let msg = message(Some("bob"));
    assert!(msg.visible_to(&AgentId::new("bob"), None));
    assert!(!msg.visible_to(&AgentId::new("carol"), None));
}

#[test]
fn broadcast_visible_to_everyone() {
    let msg = message(None);
    assert!(msg.visible_to(&AgentId::new("bob"), None));
    assert!(msg.visible_to(&AgentId::new("carol"), Some("builder")));
}

#[test]
fn broadcast_respects_excluded_roles() {
    let mut msg = message(None);
    msg.exclude_roles = Some(["reviewer".to_string()].into_iter().collect());

    assert!(!msg.visible_to(&AgentId::new("bob"), Some("reviewer")));
    assert!(msg.visible_to(&AgentId::new("bob"), Some("builder")));
    // No role: exclusion cannot match.
    assert!(msg.visible_to(&AgentId::new("bob"), None));
}

#[test]
fn status_is_not_actionable() {
    assert!(!MessageType::Status.is_actionable());
    assert!(MessageType::Task.is_actionable());
    assert!(MessageType::Interrupt.is_actionable());
}

#[test]
fn kind_serializes_as_type_field() {
    let msg = message(Some("bob"));
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "info");
    assert_eq!(json["createdAt"], 1000);
}

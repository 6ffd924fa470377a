// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    insert = { Action::Insert, EventType::Created },
    update = { Action::Update, EventType::Updated },
    delete = { Action::Delete, EventType::Deleted },
)]
fn event_type_from_action(action: Action, expected: EventType) {
    assert_eq!(EventType::from(action), expected);
}

#[test]
fn event_serializes_with_type_tag() {
    let event = Event::created("ws-1".to_string());
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "created");
    assert_eq!(json["payload"], "ws-1");
}

#[test]
fn only_deleted_events_report_deleted() {
    assert!(Event::deleted(1).is_deleted());
    assert!(!Event::updated(1).is_deleted());
}

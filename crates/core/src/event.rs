// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-feed actions and the broker's delivery envelope

use serde::{Deserialize, Serialize};

/// What a committed write did to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

impl From<Action> for EventType {
    fn from(action: Action) -> Self {
        match action {
            Action::Insert => EventType::Created,
            Action::Update => EventType::Updated,
            Action::Delete => EventType::Deleted,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::Created => "created",
            EventType::Updated => "updated",
            EventType::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// An entity change as delivered to subscribers. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub payload: T,
}

impl<T> Event<T> {
    pub fn new(kind: EventType, payload: T) -> Self {
        Self { kind, payload }
    }

    pub fn created(payload: T) -> Self {
        Self::new(EventType::Created, payload)
    }

    pub fn updated(payload: T) -> Self {
        Self::new(EventType::Updated, payload)
    }

    pub fn deleted(payload: T) -> Self {
        Self::new(EventType::Deleted, payload)
    }

    pub fn is_deleted(&self) -> bool {
        self.kind == EventType::Deleted
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

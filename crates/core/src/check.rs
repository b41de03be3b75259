//! Monitored checks and the lifecycle events recorded against them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a check.
///
/// Serialized as the lowercase kind name. Names this relay does not know
/// deserialize to [`EventKind::Other`] instead of failing, so the event
/// still reaches the enable filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Created,
    Up,
    Down,
    Paused,
    Restarted,
    Other(String),
}

impl EventKind {
    /// Kinds that ship with a built-in notification template.
    pub fn known() -> [EventKind; 5] {
        [
            EventKind::Created,
            EventKind::Up,
            EventKind::Down,
            EventKind::Paused,
            EventKind::Restarted,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Created => "created",
            EventKind::Up => "up",
            EventKind::Down => "down",
            EventKind::Paused => "paused",
            EventKind::Restarted => "restarted",
            EventKind::Other(name) => name,
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        match name {
            "created" => EventKind::Created,
            "up" => EventKind::Up,
            "down" => EventKind::Down,
            "paused" => EventKind::Paused,
            "restarted" => EventKind::Restarted,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        match EventKind::from(name.as_str()) {
            EventKind::Other(_) => EventKind::Other(name),
            known => known,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored target, as known to the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub url: String,
    /// Last known state; `None` until the first poll completes.
    #[serde(default, alias = "isUp")]
    pub is_up: Option<bool>,
    #[serde(default, alias = "isPaused")]
    pub is_paused: bool,
}

impl Check {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            is_up: None,
            is_paused: false,
        }
    }
}

/// A recorded state transition for a check.
///
/// Published by the host once the event is durably stored. Never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEvent {
    #[serde(alias = "message")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "check")]
    pub check_id: String,
    /// Error text of a failed poll (set on `down` events).
    #[serde(default)]
    pub details: Option<String>,
    /// Length of the outage an `up` event ends, in milliseconds.
    #[serde(default, alias = "downtime")]
    pub downtime_ms: Option<u64>,
}

impl CheckEvent {
    pub fn new(kind: EventKind, check_id: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            check_id: check_id.into(),
            details: None,
            downtime_ms: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_downtime_ms(mut self, downtime_ms: u64) -> Self {
        self.downtime_ms = Some(downtime_ms);
        self
    }
}

//! Outbound notifications.
//!
//! The brewing service and the confirmation gateway push these through the
//! [`NotificationPort`](super::ports::NotificationPort).  Adapters decide
//! how they reach the operator (push message, log line, test recorder).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a confirmation request, unique per gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// Operator must perform a test and confirm (iodine test).
    Test,
    /// Advisory, e.g. a hop addition is due.
    Info,
    /// Fail-safe or abort.
    Alarm,
    /// Plain progress message.
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub payload: String,
    /// Set when the notification prompts for a confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestId>,
}

impl Notification {
    pub fn new(kind: NotificationKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            request: None,
        }
    }

    pub fn info(payload: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, payload)
    }

    pub fn alarm(payload: impl Into<String>) -> Self {
        Self::new(NotificationKind::Alarm, payload)
    }

    pub fn message(payload: impl Into<String>) -> Self {
        Self::new(NotificationKind::Message, payload)
    }
}

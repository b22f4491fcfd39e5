//! Message Protocol Module
//!
//! Page → worker commands and worker → page notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Notification posted to clients. Serializes as `{"type": "SW_ACTIVATED"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    SwActivated,
}

/// Command sent by a page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    /// Activate a waiting worker now
    SkipWaiting,
}

impl ClientCommand {
    /// Recognizes a command, or None for any other shape.
    pub fn parse(raw: &Value) -> Option<Self> {
        Self::deserialize(raw).ok()
    }
}

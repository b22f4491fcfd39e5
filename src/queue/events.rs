//! Event Log Module
//!
//! Append-only record of worker lifecycle events in the `event-log` store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::{Database, EVENT_LOG_STORE};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Installed,
    InstallFailed,
    Activated,
    Evicted,
    Retired,
}

/// One logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    db: Database,
}

impl EventLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Appends an event under a fresh id.
    pub async fn record(&self, kind: EventKind, detail: Option<String>) -> Result<LogEvent> {
        let event = LogEvent {
            id: Uuid::new_v4().to_string(),
            kind,
            at: Utc::now(),
            detail,
        };
        self.db.put_as(EVENT_LOG_STORE, &event).await?;
        Ok(event)
    }

    /// Returns every logged event, oldest first.
    pub async fn entries(&self) -> Result<Vec<LogEvent>> {
        let mut events: Vec<LogEvent> = self.db.get_all_as(EVENT_LOG_STORE).await?;
        events.sort_by_key(|event| event.at);
        Ok(events)
    }

    pub async fn clear(&self) -> Result<()> {
        self.db.clear(EVENT_LOG_STORE).await
    }
}

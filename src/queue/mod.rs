//! Queue Module
//!
//! Durable records kept in the offline database: deferred mutations waiting
//! for connectivity, and the worker's event log.

mod events;
mod offline;

pub use events::{EventKind, EventLog, LogEvent};
pub use offline::{OfflineQueue, QueueItem, ReplayReport};

//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Eviction: Trims the runtime cache back under its byte budget

mod eviction;

pub use eviction::spawn_eviction_task;

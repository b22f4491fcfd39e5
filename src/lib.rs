//! Offline Shell - offline caching for a campaign web app
//!
//! A service-worker style fetch handler with versioned caches, LRU
//! eviction under a byte budget, a durable key-value store and an offline
//! queue of pending writes.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod storage;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use config::Config;
pub use error::{OfflineError, Result};
pub use tasks::spawn_eviction_task;
pub use worker::LifecycleController;

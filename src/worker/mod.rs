//! Worker Module
//!
//! Platform-agnostic service worker: lifecycle controller, its immutable
//! configuration, the network seam and the client message channel.

mod clients;
mod config;
mod lifecycle;
mod message;
mod network;

pub use clients::ClientRegistry;
pub use config::{CacheNames, WorkerConfig, DEFAULT_PRECACHE_MANIFEST};
pub use lifecycle::{
    ActivationReport, InstallReport, LifecycleController, MessageOutcome, WorkerState,
};
pub use message::{ClientCommand, WorkerMessage};
pub use network::{HttpNetwork, Network};

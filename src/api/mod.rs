//! API Module
//!
//! HTTP host for the offline worker: control endpoints under `/sw`, the
//! offline queue under `/queue`, and a fallback that routes every other
//! request through the worker's fetch handler.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;

//! # tiergate-service
//!
//! The entitlement facade handed to message-handling and admin code.
//!
//! ## Modules
//! - `service` — `TierGate`: redemption, effective plan, quota admission, card/subscription admin
//! - `retry` — bounded linear backoff for idempotent reads
//! - `maintenance` — periodic expiry sweep and quota-window reclamation on tokio
//! - `observability` — tracing subscriber setup

pub mod maintenance;
pub mod observability;
pub mod retry;
pub mod service;

pub use maintenance::{spawn_maintenance, MaintenanceHandle, MaintenanceSnapshot};
pub use observability::init_tracing;
pub use service::TierGate;

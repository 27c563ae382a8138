//! # tiergate-core
//!
//! Entitlement model for hourly message quotas granted by stacked subscriptions.
//!
//! ## Modules
//! - `config` — TierGateConfig and per-subsystem sections, TOML loading, validation
//! - `errors` — TierGateError, ErrorKind taxonomy, RecoveryAction
//! - `models` — Plan, Card, Subscription, QuotaWindow and their request/result types
//! - `resolver` — effective subscription at an instant, coverage timeline
//! - `scheduler` — priority stacking of newly redeemed subscriptions
//! - `time` — hour windows and millisecond normalisation
//! - `traits` — IEntitlementStorage, Clock

pub mod config;
pub mod errors;
pub mod models;
pub mod resolver;
pub mod scheduler;
pub mod time;
pub mod traits;

pub use config::TierGateConfig;
pub use errors::{ErrorKind, TierGateError, TierGateResult};

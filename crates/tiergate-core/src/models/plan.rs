//! Plan catalog: named tiers with an hourly message limit and a priority rank.
//!
//! - FREE: 10 messages/hour, priority 0, default
//! - PLUS: 25 messages/hour, priority 25
//! - PRO: 50 messages/hour, priority 50
//! - MAX: 200 messages/hour, priority 100

use serde::{Deserialize, Serialize};

use crate::errors::{TierGateError, TierGateResult};

/// A persisted plan. Immutable at runtime; only catalog seeding writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub hourly_message_limit: u32,
    /// Higher wins when subscriptions overlap.
    pub priority: i32,
    pub monthly_price: f64,
    pub is_default: bool,
    pub is_active: bool,
    pub features: Option<serde_json::Value>,
}

/// Catalog entry used for seeding. Upserted by `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSeed {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub hourly_message_limit: u32,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub monthly_price: f64,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub features: Option<serde_json::Value>,
}

impl PlanSeed {
    fn new(code: &str, name: &str, limit: u32, price: f64, priority: i32, is_default: bool) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            description: Some(format!("{name} tier")),
            hourly_message_limit: limit,
            priority,
            monthly_price: price,
            is_default,
            features: None,
        }
    }
}

/// The built-in catalog.
pub fn default_catalog() -> Vec<PlanSeed> {
    vec![
        PlanSeed::new("FREE", "Free", 10, 0.0, 0, true),
        PlanSeed::new("PLUS", "Plus", 25, 3.0, 25, false),
        PlanSeed::new("PRO", "Pro", 50, 5.0, 50, false),
        PlanSeed::new("MAX", "Max", 200, 20.0, 100, false),
    ]
}

/// Check catalog invariants: unique codes, positive limits, exactly one default.
pub fn validate_catalog(seeds: &[PlanSeed]) -> TierGateResult<()> {
    let defaults = seeds.iter().filter(|s| s.is_default).count();
    if defaults != 1 {
        return Err(TierGateError::Config(format!(
            "plan catalog must have exactly one default plan, found {defaults}"
        )));
    }
    for (i, seed) in seeds.iter().enumerate() {
        if seed.code.trim().is_empty() {
            return Err(TierGateError::Config(format!("plan #{i} has an empty code")));
        }
        if seed.hourly_message_limit == 0 {
            return Err(TierGateError::Config(format!(
                "plan {} must have a positive hourly limit",
                seed.code
            )));
        }
        if seeds[..i].iter().any(|other| other.code == seed.code) {
            return Err(TierGateError::Config(format!("duplicate plan code {}", seed.code)));
        }
    }
    Ok(())
}

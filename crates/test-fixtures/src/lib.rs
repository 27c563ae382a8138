//! Shared fixtures for integration tests: a settable clock, seeded engines,
//! and card builders.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

use tiergate_core::config::StorageConfig;
use tiergate_core::models::plan::default_catalog;
use tiergate_core::models::{Card, NewCard};
use tiergate_core::traits::{Clock, IEntitlementStorage};
use tiergate_storage::StorageEngine;

/// 2025-01-06 10:20:00 UTC, a Monday, mid-hour.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 10, 20, 0).unwrap()
}

/// A clock tests move by hand.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(epoch())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory engine with the built-in catalog.
pub fn seeded_engine() -> StorageEngine {
    let engine = StorageEngine::open_in_memory().unwrap();
    engine.seed_plans(&default_catalog()).unwrap();
    engine
}

/// File-backed engine in a fresh temp dir. Keep the `TempDir` alive.
pub fn file_engine() -> (TempDir, StorageEngine) {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_file_engine(&dir.path().join("tiergate.db"));
    (dir, engine)
}

/// Open (and seed) an engine on an existing path. Several engines on one path
/// behave like separate processes sharing the database.
pub fn open_file_engine(path: &Path) -> StorageEngine {
    let engine = StorageEngine::open(path, &StorageConfig::default()).unwrap();
    engine.seed_plans(&default_catalog()).unwrap();
    engine
}

/// Insert a `new` card for `plan_code`.
pub fn issue_card(storage: &dyn IEntitlementStorage, code: &str, plan_code: &str, valid_days: i64) -> Card {
    let plan = storage.get_plan(plan_code).unwrap().unwrap();
    storage
        .insert_card(&NewCard {
            code: code.to_string(),
            plan_id: plan.id,
            valid_days,
            expires_at: None,
            created_by_admin: None,
            metadata: None,
        })
        .unwrap()
}

/// Like `issue_card` with a redemption deadline.
pub fn issue_card_with_deadline(
    storage: &dyn IEntitlementStorage,
    code: &str,
    plan_code: &str,
    valid_days: i64,
    deadline: DateTime<Utc>,
) -> Card {
    let plan = storage.get_plan(plan_code).unwrap().unwrap();
    storage
        .insert_card(&NewCard {
            code: code.to_string(),
            plan_id: plan.id,
            valid_days,
            expires_at: Some(deadline),
            created_by_admin: None,
            metadata: None,
        })
        .unwrap()
}

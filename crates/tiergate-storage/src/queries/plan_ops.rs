//! Raw SQL operations for the plans table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use tiergate_core::errors::TierGateResult;
use tiergate_core::models::{Plan, PlanSeed};

use super::{json_column, json_param};
use crate::to_storage_err;

const PLAN_COLUMNS: &str = "id, code, name, description, hourly_message_limit, priority,
     monthly_price, is_default, is_active, features";

fn map_plan(row: &Row<'_>) -> rusqlite::Result<Plan> {
    Ok(Plan {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        hourly_message_limit: row.get(4)?,
        priority: row.get(5)?,
        monthly_price: row.get(6)?,
        is_default: row.get(7)?,
        is_active: row.get(8)?,
        features: json_column(row, 9)?,
    })
}

/// Mark every plan inactive and non-default ahead of a reseed.
pub fn retire_all(conn: &Connection, now_ms: i64) -> TierGateResult<usize> {
    conn.execute(
        "UPDATE plans SET is_default = 0, is_active = 0, updated_at = ?1",
        params![now_ms],
    )
    .map_err(to_storage_err)
}

/// Insert or refresh a plan by code.
pub fn upsert_plan(conn: &Connection, seed: &PlanSeed, now_ms: i64) -> TierGateResult<()> {
    conn.execute(
        "INSERT INTO plans
            (code, name, description, hourly_message_limit, priority, monthly_price,
             is_default, is_active, features, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?9)
         ON CONFLICT(code) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            hourly_message_limit = excluded.hourly_message_limit,
            priority = excluded.priority,
            monthly_price = excluded.monthly_price,
            is_default = excluded.is_default,
            is_active = 1,
            features = excluded.features,
            updated_at = excluded.updated_at",
        params![
            seed.code,
            seed.name,
            seed.description,
            seed.hourly_message_limit,
            seed.priority,
            seed.monthly_price,
            seed.is_default,
            json_param(&seed.features),
            now_ms,
        ],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

/// All plans, highest priority first.
pub fn list_plans(conn: &Connection) -> TierGateResult<Vec<Plan>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans ORDER BY priority DESC, code ASC"
        ))
        .map_err(to_storage_err)?;
    let rows = stmt.query_map([], map_plan).map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}

pub fn get_plan_by_code(conn: &Connection, code: &str) -> TierGateResult<Option<Plan>> {
    conn.query_row(
        &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE code = ?1"),
        params![code],
        map_plan,
    )
    .optional()
    .map_err(to_storage_err)
}

pub fn get_plan_by_id(conn: &Connection, id: i64) -> TierGateResult<Option<Plan>> {
    conn.query_row(
        &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = ?1"),
        params![id],
        map_plan,
    )
    .optional()
    .map_err(to_storage_err)
}

pub fn get_default_plan(conn: &Connection) -> TierGateResult<Option<Plan>> {
    conn.query_row(
        &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE is_default = 1 AND is_active = 1"),
        [],
        map_plan,
    )
    .optional()
    .map_err(to_storage_err)
}

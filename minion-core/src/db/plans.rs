use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{agents, get_enum, get_ts, now, ts, Database};
use crate::error::{CommsError, Result};
use crate::models::*;

const PLAN_COLUMNS: &str = "id, set_by, plan, status, created_at, updated_at";

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<BattlePlan> {
    Ok(BattlePlan {
        id: row.get("id")?,
        set_by: row.get("set_by")?,
        plan: row.get("plan")?,
        status: get_enum(row, "status", PlanStatus::from_str)?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

pub(crate) fn active_plan(conn: &Connection) -> Result<Option<BattlePlan>> {
    let plan = conn
        .query_row(
            &format!(
                "SELECT {} FROM battle_plan WHERE status = 'active'",
                PLAN_COLUMNS
            ),
            [],
            plan_from_row,
        )
        .optional()?;
    Ok(plan)
}

fn find_plan(conn: &Connection, id: i64) -> Result<Option<BattlePlan>> {
    let plan = conn
        .query_row(
            &format!("SELECT {} FROM battle_plan WHERE id = ?1", PLAN_COLUMNS),
            params![id],
            plan_from_row,
        )
        .optional()?;
    Ok(plan)
}

/// Move the active plan (if any) to `status`. Returns its id.
pub(crate) fn retire_active(
    conn: &Connection,
    status: PlanStatus,
    at: DateTime<Utc>,
) -> Result<Option<i64>> {
    let Some(current) = active_plan(conn)? else {
        return Ok(None);
    };
    conn.execute(
        "UPDATE battle_plan SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), ts(at), current.id],
    )?;
    Ok(Some(current.id))
}

impl Database {
    /// Replace the team objective. Lead only. The previous active plan is
    /// superseded in the same transaction.
    pub fn set_battle_plan(&self, agent: &str, plan: &str) -> Result<BattlePlan> {
        if plan.trim().is_empty() {
            return Err(CommsError::Validation("Battle plan text must not be empty.".into()));
        }
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "set the battle plan")?;
            let at = now();
            let superseded = retire_active(tx, PlanStatus::Superseded, at)?;

            tx.execute(
                "INSERT INTO battle_plan (set_by, plan, status, created_at, updated_at)
                 VALUES (?1, ?2, 'active', ?3, ?3)",
                params![agent, plan, ts(at)],
            )?;
            let id = tx.last_insert_rowid();

            tracing::info!(agent, plan_id = id, ?superseded, "battle plan set");
            Ok(BattlePlan {
                id,
                set_by: agent.to_string(),
                plan: plan.to_string(),
                status: PlanStatus::Active,
                created_at: at,
                updated_at: at,
            })
        })
    }

    /// Plans with the given status, newest first.
    pub fn get_battle_plan(&self, status: PlanStatus) -> Result<Vec<BattlePlan>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM battle_plan WHERE status = ?1 ORDER BY created_at DESC, id DESC",
                PLAN_COLUMNS
            ))?;
            let plans = stmt
                .query_map(params![status.as_str()], plan_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(plans)
        })
    }

    pub fn active_battle_plan(&self) -> Result<Option<BattlePlan>> {
        self.with_connection(active_plan)
    }

    /// Set any status on a plan. Lead only. Reactivating a plan supersedes
    /// whichever plan is active now.
    pub fn update_battle_plan_status(
        &self,
        agent: &str,
        plan_id: i64,
        status: PlanStatus,
    ) -> Result<PlanStatusChange> {
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "update battle plan status")?;
            let plan = find_plan(tx, plan_id)?.ok_or_else(|| {
                CommsError::NotFound(format!("Battle plan #{} not found.", plan_id))
            })?;
            let at = now();

            let superseded = if status == PlanStatus::Active && plan.status != PlanStatus::Active {
                retire_active(tx, PlanStatus::Superseded, at)?
            } else {
                None
            };

            tx.execute(
                "UPDATE battle_plan SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), ts(at), plan_id],
            )?;

            tracing::info!(
                agent,
                plan_id,
                from = plan.status.as_str(),
                to = status.as_str(),
                "battle plan status changed"
            );
            Ok(PlanStatusChange {
                plan_id,
                from: plan.status,
                to: status,
                superseded,
            })
        })
    }
}

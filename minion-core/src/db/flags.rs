use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{agents, get_ts_opt, now, raid, ts, Database};
use crate::error::Result;
use crate::models::*;
use crate::policy::triggers::Trigger;

fn flag_from_row(row: &Row<'_>) -> rusqlite::Result<EmergencyFlag> {
    Ok(EmergencyFlag {
        key: row.get("key")?,
        value: row.get("value")?,
        set_by: row.get("set_by")?,
        set_at: get_ts_opt(row, "set_at")?,
    })
}

pub(crate) fn is_set(conn: &Connection, key: &str) -> Result<bool> {
    let value: Option<bool> = conn
        .query_row(
            "SELECT value FROM flags WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(false))
}

/// Set a flag. Returns true when it was not already set.
pub(crate) fn raise(conn: &Connection, key: &str, by: &str, at: DateTime<Utc>) -> Result<bool> {
    let was_set = is_set(conn, key)?;
    conn.execute(
        "INSERT INTO flags (key, value, set_by, set_at) VALUES (?1, 1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = 1, set_by = excluded.set_by, set_at = excluded.set_at",
        params![key, by, ts(at)],
    )?;
    Ok(!was_set)
}

impl Database {
    /// Lower the emergency flag. Lead only. Returns whether it was raised.
    pub fn clear_moon_crash(&self, agent: &str) -> Result<bool> {
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "clear moon_crash")?;
            let at = now();
            let was_set = is_set(tx, MOON_CRASH)?;
            if was_set {
                tx.execute(
                    "UPDATE flags SET value = 0, set_by = ?1, set_at = ?2 WHERE key = ?3",
                    params![agent, ts(at), MOON_CRASH],
                )?;
                raid::append(
                    tx,
                    agent,
                    "moon_crash cleared. Task assignment resumed.",
                    RaidPriority::High,
                    at,
                )?;
                tracing::info!(agent, "moon_crash cleared");
            }
            Ok(was_set)
        })
    }

    pub fn moon_crash_active(&self) -> Result<bool> {
        self.with_connection(|conn| is_set(conn, MOON_CRASH))
    }

    /// Trigger vocabulary and the current state of every flag.
    pub fn get_triggers(&self) -> Result<TriggerBoard> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key, value, set_by, set_at FROM flags ORDER BY key")?;
            let mut flags = stmt
                .query_map([], flag_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if !flags.iter().any(|f| f.key == MOON_CRASH) {
                flags.push(EmergencyFlag {
                    key: MOON_CRASH.to_string(),
                    value: false,
                    set_by: None,
                    set_at: None,
                });
            }
            Ok(TriggerBoard {
                triggers: Trigger::ALL.iter().map(Trigger::info).collect(),
                flags,
            })
        })
    }
}

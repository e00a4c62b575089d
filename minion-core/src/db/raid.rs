use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, Row};

use super::{agents, get_enum, get_ts, non_empty, now, ts, Database};
use crate::error::{CommsError, Result};
use crate::models::*;

const RAID_COLUMNS: &str = "id, agent_name, entry, priority, created_at";

fn raid_from_row(row: &Row<'_>) -> rusqlite::Result<RaidLogEntry> {
    Ok(RaidLogEntry {
        id: row.get("id")?,
        agent_name: row.get("agent_name")?,
        entry: row.get("entry")?,
        priority: get_enum(row, "priority", RaidPriority::from_str)?,
        created_at: get_ts(row, "created_at")?,
    })
}

/// Append an entry. Used by `log_raid` and by system events.
pub(crate) fn append(
    conn: &Connection,
    agent: &str,
    entry: &str,
    priority: RaidPriority,
    at: DateTime<Utc>,
) -> Result<RaidLogEntry> {
    conn.execute(
        "INSERT INTO raid_log (agent_name, entry, priority, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![agent, entry, priority.as_str(), ts(at)],
    )?;
    Ok(RaidLogEntry {
        id: conn.last_insert_rowid(),
        agent_name: agent.to_string(),
        entry: entry.to_string(),
        priority,
        created_at: at,
    })
}

/// Newest entries at `min` priority or above.
pub(crate) fn recent_at_least(
    conn: &Connection,
    min: RaidPriority,
    limit: u32,
) -> Result<Vec<RaidLogEntry>> {
    let wanted: Vec<Value> = RaidPriority::ALL
        .iter()
        .filter(|p| **p >= min)
        .map(|p| Value::Text(p.as_str().to_string()))
        .collect();
    let placeholders = vec!["?"; wanted.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM raid_log WHERE priority IN ({}) ORDER BY created_at DESC, id DESC LIMIT {}",
        RAID_COLUMNS, placeholders, limit
    ))?;
    let entries = stmt
        .query_map(params_from_iter(wanted), raid_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

impl Database {
    /// Append to the team's log. Any registered agent may write.
    pub fn log_raid(&self, agent: &str, entry: &str, priority: RaidPriority) -> Result<RaidLogEntry> {
        if entry.trim().is_empty() {
            return Err(CommsError::Validation("Raid log entry must not be empty.".into()));
        }
        self.transaction(|tx| {
            agents::require_agent(tx, agent)?;
            let at = now();
            let logged = append(tx, agent, entry, priority, at)?;
            agents::touch(tx, agent, at)?;
            tracing::info!(agent, id = logged.id, priority = priority.as_str(), "raid log entry");
            Ok(logged)
        })
    }

    /// Newest first, optionally filtered by priority and author.
    pub fn get_raid_log(&self, filter: &RaidLogFilter) -> Result<Vec<RaidLogEntry>> {
        self.with_connection(|conn| {
            let mut sql = format!("SELECT {} FROM raid_log WHERE 1=1", RAID_COLUMNS);
            let mut values: Vec<Value> = Vec::new();

            if let Some(priority) = filter.priority {
                sql.push_str(" AND priority = ?");
                values.push(Value::Text(priority.as_str().to_string()));
            }
            if let Some(agent) = non_empty(filter.agent_name.as_deref()) {
                sql.push_str(" AND agent_name = ?");
                values.push(Value::Text(agent.to_string()));
            }
            sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
            values.push(Value::Integer(i64::from(filter.count)));

            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params_from_iter(values), raid_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }
}

use std::path::Path;

use rusqlite::{params, Connection, Row};

use super::{agents, claims, flags, gates, get_json, get_ts, now, plans, raid, tasks, ts, Database};
use crate::error::{CommsError, Result};
use crate::models::*;

/// How many high-priority raid entries a cold start replays.
const COLD_START_RAID_ENTRIES: u32 = 10;

fn fenix_from_row(row: &Row<'_>) -> rusqlite::Result<FenixDownRecord> {
    Ok(FenixDownRecord {
        id: row.get("id")?,
        agent_name: row.get("agent_name")?,
        files: get_json(row, "files")?,
        manifest: row.get("manifest")?,
        consumed: row.get("consumed")?,
        created_at: get_ts(row, "created_at")?,
    })
}

/// Hand over every unconsumed record for `agent` and mark them consumed.
fn consume_fenix(conn: &Connection, agent: &str) -> Result<Vec<FenixDownRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, agent_name, files, manifest, consumed, created_at FROM fenix_down
         WHERE agent_name = ?1 AND consumed = 0 ORDER BY created_at, id",
    )?;
    let records = stmt
        .query_map(params![agent], fenix_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    conn.execute(
        "UPDATE fenix_down SET consumed = 1 WHERE agent_name = ?1 AND consumed = 0",
        params![agent],
    )?;
    Ok(records)
}

impl Database {
    /// Everything an agent needs to pick up where it left off.
    pub fn cold_start(&self, agent: &str) -> Result<ColdStart> {
        self.transaction(|tx| {
            let at = now();
            agents::require_agent(tx, agent)?;
            agents::touch(tx, agent, at)?;

            let fenix_down = consume_fenix(tx, agent)?;
            let claims = claims::held_by(tx, agent)?
                .into_iter()
                .map(|claim| {
                    let waitlist = claims::waitlist(tx, &claim.file_path)?;
                    Ok(ClaimView { claim, waitlist })
                })
                .collect::<Result<Vec<_>>>()?;

            let view = agents::view(agents::require_agent(tx, agent)?, at);
            tracing::info!(agent, fenix_records = fenix_down.len(), "cold start");
            Ok(ColdStart {
                agent: view,
                battle_plan: plans::active_plan(tx)?,
                recent_raid_log: raid::recent_at_least(
                    tx,
                    RaidPriority::High,
                    COLD_START_RAID_ENTRIES,
                )?,
                tasks: tasks::open_tasks_for(tx, agent)?,
                claims,
                unread_count: gates::unread_counts(tx, agent)?.total(),
                moon_crash: flags::is_set(tx, MOON_CRASH)?,
                fenix_down,
            })
        })
    }

    /// File a knowledge dump to be replayed on the agent's next cold start.
    pub fn fenix_down(&self, agent: &str, input: FenixDownInput) -> Result<FenixDownRecord> {
        if input.manifest.trim().is_empty() {
            return Err(CommsError::Validation("fenix_down manifest must not be empty.".into()));
        }
        self.transaction(|tx| {
            agents::require_agent(tx, agent)?;
            let at = now();
            tx.execute(
                "INSERT INTO fenix_down (agent_name, files, manifest, consumed, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![agent, serde_json::to_string(&input.files)?, input.manifest, ts(at)],
            )?;
            let id = tx.last_insert_rowid();

            raid::append(
                tx,
                agent,
                &format!(
                    "fenix_down #{} filed by {} ({} file(s))",
                    id,
                    agent,
                    input.files.len()
                ),
                RaidPriority::Normal,
                at,
            )?;
            agents::touch(tx, agent, at)?;

            tracing::info!(agent, id, "fenix_down filed");
            Ok(FenixDownRecord {
                id,
                agent_name: agent.to_string(),
                files: input.files.clone(),
                manifest: input.manifest.clone(),
                consumed: false,
                created_at: at,
            })
        })
    }

    /// Record a session debrief document. Lead only.
    pub fn debrief(&self, agent: &str, debrief_file: &str) -> Result<RaidLogEntry> {
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "file a debrief")?;
            if !Path::new(debrief_file).exists() {
                return Err(CommsError::Blocked(format!(
                    "Debrief file does not exist: {}",
                    debrief_file
                )));
            }
            let at = now();
            let entry = raid::append(
                tx,
                agent,
                &format!("Debrief filed: {}", debrief_file),
                RaidPriority::High,
                at,
            )?;
            agents::touch(tx, agent, at)?;
            tracing::info!(agent, debrief_file, "debrief filed");
            Ok(entry)
        })
    }

    /// Wrap up the session: complete the active plan and report loose ends. Lead only.
    pub fn end_session(&self, agent: &str) -> Result<SessionEnd> {
        self.transaction(|tx| {
            agents::require_lead(tx, agent, "end the session")?;
            let at = now();
            let completed_plan = plans::retire_active(tx, PlanStatus::Completed, at)?;

            let active_tasks: i64 = tx.query_row(
                "SELECT COUNT(*) FROM tasks WHERE status IN ('open', 'assigned', 'in_progress')",
                [],
                |row| row.get(0),
            )?;
            let held_claims: i64 =
                tx.query_row("SELECT COUNT(*) FROM file_claims", [], |row| row.get(0))?;

            let summary = match completed_plan {
                Some(id) => format!(
                    "Session ended by {}. Battle plan #{} completed. {} active task(s), {} held claim(s).",
                    agent, id, active_tasks, held_claims
                ),
                None => format!(
                    "Session ended by {}. No active battle plan. {} active task(s), {} held claim(s).",
                    agent, active_tasks, held_claims
                ),
            };
            raid::append(tx, agent, &summary, RaidPriority::High, at)?;
            agents::touch(tx, agent, at)?;

            tracing::info!(agent, ?completed_plan, active_tasks, held_claims, "session ended");
            Ok(SessionEnd {
                ended_by: agent.to_string(),
                completed_plan,
                active_tasks,
                held_claims,
            })
        })
    }
}

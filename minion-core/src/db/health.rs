use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{agents, claims, flags, now, parse_ts, plans, tasks, Database};
use crate::error::Result;
use crate::models::*;
use crate::policy::{liveness, staleness};

/// Modification time of `path`, or `None` when it cannot be read.
fn mtime(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn last_task_update(conn: &Connection, agent: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT MAX(updated_at) FROM tasks WHERE assigned_to = ?1",
            params![agent],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten();
    Ok(raw.and_then(|r| parse_ts(&r).ok()))
}

/// Files the agent is known to be working on: its claims plus the files
/// recorded on its open tasks.
fn working_files(conn: &Connection, agent: &str) -> Result<BTreeSet<String>> {
    let mut files: BTreeSet<String> = claims::held_by(conn, agent)?
        .into_iter()
        .map(|c| c.file_path)
        .collect();
    for task in tasks::open_tasks_for(conn, agent)? {
        files.extend(task.files);
    }
    Ok(files)
}

fn last_file_write(conn: &Connection, agent: &str) -> Result<Option<DateTime<Utc>>> {
    Ok(working_files(conn, agent)?
        .iter()
        .filter_map(|f| mtime(Path::new(f)))
        .max())
}

fn judge(conn: &Connection, agent: &Agent, at: DateTime<Utc>) -> Result<ActivityReport> {
    let last_task_update = last_task_update(conn, &agent.name)?;
    let last_file_write = last_file_write(conn, &agent.name)?;
    Ok(ActivityReport {
        agent_name: agent.name.clone(),
        last_seen: agent.last_seen,
        last_task_update,
        last_file_write,
        liveness: liveness::judge(at, agent.last_seen, last_task_update, last_file_write),
    })
}

impl Database {
    /// The whole team at a glance.
    pub fn party_status(&self) -> Result<PartyStatus> {
        let at = now();
        let roster = self.who()?;
        self.with_connection(|conn| {
            let mut members = Vec::with_capacity(roster.len());
            for view in roster {
                let report = judge(conn, &view.agent, at)?;
                let claimed_files = claims::held_by(conn, &view.agent.name)?
                    .into_iter()
                    .map(|c| c.file_path)
                    .collect();
                let active_tasks = tasks::open_tasks_for(conn, &view.agent.name)?
                    .into_iter()
                    .filter(|t| TaskStatus::ACTIVE.contains(&t.status))
                    .map(|t| t.id)
                    .collect();
                members.push(PartyMember {
                    view,
                    liveness: report.liveness,
                    claimed_files,
                    active_tasks,
                });
            }
            Ok(PartyStatus {
                battle_plan: plans::active_plan(conn)?,
                moon_crash: flags::is_set(conn, MOON_CRASH)?,
                members,
            })
        })
    }

    pub fn check_activity(&self, agent: &str) -> Result<ActivityReport> {
        self.with_connection(|conn| {
            let record = agents::require_agent(conn, agent)?;
            judge(conn, &record, now())
        })
    }

    /// Has the ground moved under the agent since it last loaded context?
    pub fn check_freshness(&self, agent: &str) -> Result<FreshnessReport> {
        self.with_connection(|conn| {
            let at = now();
            let record = agents::require_agent(conn, agent)?;
            let verdict = staleness::evaluate(record.agent_class, record.context_updated_at, at);

            let mut watched = working_files(conn, agent)?;
            for task in tasks::open_tasks_for(conn, agent)? {
                if let Some(zone) = task.zone.filter(|z| !z.trim().is_empty()) {
                    watched.insert(zone);
                }
            }

            let changed_since_context = watched
                .into_iter()
                .filter_map(|path| {
                    let modified_at = mtime(Path::new(&path))?;
                    let changed = record
                        .context_updated_at
                        .map_or(true, |loaded| modified_at > loaded);
                    changed.then_some(ChangedPath { path, modified_at })
                })
                .collect();

            Ok(FreshnessReport {
                agent_name: record.name.clone(),
                context_updated_at: record.context_updated_at,
                context_stale: verdict.is_stale(),
                staleness_message: verdict.message(record.agent_class),
                changed_since_context,
            })
        })
    }
}

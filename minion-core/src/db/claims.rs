//! Exclusive file claims with a FIFO waitlist per path.
//!
//! A claim is advisory coordination, not a filesystem lock. Paths are
//! normalized before they reach the table so `./src/a.rs` and
//! `src/a.rs` contend for the same row.

use std::env;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{agents, get_ts, now, ts, Database};
use crate::error::{CommsError, Result};
use crate::models::*;
use crate::policy::paths;

fn claim_from_row(row: &Row<'_>) -> rusqlite::Result<FileClaim> {
    Ok(FileClaim {
        file_path: row.get("file_path")?,
        holder: row.get("holder")?,
        claimed_at: get_ts(row, "claimed_at")?,
    })
}

fn normalize(path: &str) -> Result<String> {
    if path.trim().is_empty() {
        return Err(CommsError::Validation("file_path must not be empty.".into()));
    }
    Ok(paths::normalize(path, &env::current_dir()?))
}

fn find_claim(conn: &Connection, path: &str) -> Result<Option<FileClaim>> {
    let claim = conn
        .query_row(
            "SELECT file_path, holder, claimed_at FROM file_claims WHERE file_path = ?1",
            params![path],
            claim_from_row,
        )
        .optional()?;
    Ok(claim)
}

/// Agents waiting on `path`, first in line first.
pub(crate) fn waitlist(conn: &Connection, path: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT agent_name FROM file_waitlist WHERE file_path = ?1 ORDER BY added_at, rowid",
    )?;
    let names = stmt
        .query_map(params![path], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

pub(crate) fn held_by(conn: &Connection, holder: &str) -> Result<Vec<FileClaim>> {
    let mut stmt = conn.prepare(
        "SELECT file_path, holder, claimed_at FROM file_claims WHERE holder = ?1 ORDER BY file_path",
    )?;
    let claims = stmt
        .query_map(params![holder], claim_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(claims)
}

fn with_waitlist(conn: &Connection, claim: FileClaim) -> Result<ClaimView> {
    let waitlist = waitlist(conn, &claim.file_path)?;
    Ok(ClaimView { claim, waitlist })
}

/// Drop the claim on `claim.file_path`, consuming its waitlist.
fn release(conn: &Connection, claim: FileClaim, released_by: &str) -> Result<ReleasedClaim> {
    let waiting = waitlist(conn, &claim.file_path)?;
    conn.execute(
        "DELETE FROM file_claims WHERE file_path = ?1",
        params![claim.file_path],
    )?;
    conn.execute(
        "DELETE FROM file_waitlist WHERE file_path = ?1",
        params![claim.file_path],
    )?;
    Ok(ReleasedClaim {
        file_path: claim.file_path,
        released_by: released_by.to_string(),
        previous_holder: claim.holder,
        waitlist: waiting,
    })
}

/// Release every claim `holder` has. Used when an agent leaves.
pub(crate) fn release_all_held(conn: &Connection, holder: &str) -> Result<Vec<ReleasedClaim>> {
    held_by(conn, holder)?
        .into_iter()
        .map(|claim| release(conn, claim, holder))
        .collect()
}

/// Remove `agent` from every waitlist. Returns the affected paths.
pub(crate) fn leave_all_waitlists(conn: &Connection, agent: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT file_path FROM file_waitlist WHERE agent_name = ?1 ORDER BY file_path",
    )?;
    let paths = stmt
        .query_map(params![agent], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    conn.execute(
        "DELETE FROM file_waitlist WHERE agent_name = ?1",
        params![agent],
    )?;
    Ok(paths)
}

impl Database {
    /// Claim a path for exclusive editing. When someone else holds it the
    /// caller joins the waitlist (once) and gets its position back.
    pub fn claim_file(&self, agent: &str, file_path: &str) -> Result<ClaimOutcome> {
        let path = normalize(file_path)?;
        self.transaction(|tx| {
            agents::require_agent(tx, agent)?;
            let at = now();
            agents::touch(tx, agent, at)?;

            if let Some(existing) = find_claim(tx, &path)? {
                if existing.holder == agent {
                    return Ok(ClaimOutcome::AlreadyHeld { claim: existing });
                }

                tx.execute(
                    "INSERT OR IGNORE INTO file_waitlist (file_path, agent_name, added_at)
                     VALUES (?1, ?2, ?3)",
                    params![path, agent, ts(at)],
                )?;
                let queue = waitlist(tx, &path)?;
                let position = queue.iter().position(|n| n == agent).map_or(queue.len(), |i| i + 1);

                tracing::debug!(agent, path = %path, holder = %existing.holder, position, "claim waitlisted");
                return Ok(ClaimOutcome::Waitlisted {
                    file_path: path.clone(),
                    holder: existing.holder,
                    position,
                });
            }

            tx.execute(
                "INSERT INTO file_claims (file_path, holder, claimed_at) VALUES (?1, ?2, ?3)",
                params![path, agent, ts(at)],
            )?;
            // A granted claim takes the agent out of this path's queue.
            tx.execute(
                "DELETE FROM file_waitlist WHERE file_path = ?1 AND agent_name = ?2",
                params![path, agent],
            )?;

            tracing::info!(agent, path = %path, "file claimed");
            Ok(ClaimOutcome::Granted {
                claim: FileClaim {
                    file_path: path.clone(),
                    holder: agent.to_string(),
                    claimed_at: at,
                },
            })
        })
    }

    /// Release a claim. Only the holder may, or a lead with `force`.
    pub fn release_file(&self, agent: &str, file_path: &str, force: bool) -> Result<ReleasedClaim> {
        let path = normalize(file_path)?;
        self.transaction(|tx| {
            let caller = agents::require_agent(tx, agent)?;
            let claim = find_claim(tx, &path)?.ok_or_else(|| {
                CommsError::NotFound(format!("No claim on '{}'.", path))
            })?;

            if claim.holder != agent {
                if !force {
                    return Err(CommsError::Unauthorized(format!(
                        "'{}' is claimed by '{}'. Only the holder can release it.",
                        path, claim.holder
                    )));
                }
                if caller.agent_class != AgentClass::Lead {
                    return Err(CommsError::Unauthorized(format!(
                        "Only lead-class agents can force-release claims. '{}' is class '{}'.",
                        agent,
                        caller.agent_class.as_str()
                    )));
                }
            }

            agents::touch(tx, agent, now())?;
            let released = release(tx, claim, agent)?;
            tracing::info!(
                agent,
                path = %released.file_path,
                previous_holder = %released.previous_holder,
                next = ?released.next_in_line(),
                "file released"
            );
            Ok(released)
        })
    }

    /// Current claims with their waitlists, optionally for one holder.
    pub fn get_claims(&self, holder: Option<&str>) -> Result<Vec<ClaimView>> {
        self.with_connection(|conn| {
            let claims = match super::non_empty(holder) {
                Some(holder) => held_by(conn, holder)?,
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT file_path, holder, claimed_at FROM file_claims ORDER BY file_path",
                    )?;
                    let all = stmt
                        .query_map([], claim_from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    all
                }
            };
            claims
                .into_iter()
                .map(|claim| with_waitlist(conn, claim))
                .collect()
        })
    }
}

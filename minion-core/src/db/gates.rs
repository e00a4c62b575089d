//! Preconditions a send must pass, evaluated in a fixed order.
//!
//! The first failing gate is reported. Gates only read, so a blocked send
//! leaves no trace.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{agents, plans};
use crate::error::{CommsError, Result};
use crate::models::BROADCAST;
use crate::policy::staleness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadCounts {
    pub direct: i64,
    pub broadcast: i64,
}

impl UnreadCounts {
    pub fn total(&self) -> i64 {
        self.direct + self.broadcast
    }
}

/// Unread direct messages plus broadcasts by others not yet acknowledged.
pub(crate) fn unread_counts(conn: &Connection, agent: &str) -> Result<UnreadCounts> {
    let direct = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE to_agent = ?1 AND read_flag = 0",
        params![agent],
        |row| row.get(0),
    )?;
    let broadcast = conn.query_row(
        "SELECT COUNT(*) FROM messages
         WHERE to_agent = ?1 AND from_agent != ?2
           AND id NOT IN (SELECT message_id FROM broadcast_reads WHERE agent_name = ?2)",
        params![BROADCAST, agent],
        |row| row.get(0),
    )?;
    Ok(UnreadCounts { direct, broadcast })
}

pub(crate) fn evaluate_send_gates(conn: &Connection, sender: &str, at: DateTime<Utc>) -> Result<()> {
    let unread = unread_counts(conn, sender)?.total();
    if unread > 0 {
        tracing::debug!(sender, unread, "send blocked: unread inbox");
        return Err(CommsError::Blocked(format!(
            "You have {} unread message(s). Call check_inbox first.",
            unread
        )));
    }

    if plans::active_plan(conn)?.is_none() {
        tracing::debug!(sender, "send blocked: no active battle plan");
        return Err(CommsError::Blocked(
            "No active battle plan. Lead must call set_battle_plan before comms can flow.".into(),
        ));
    }

    // Unknown senders are not gated; they get auto-registered on commit.
    if let Some(agent) = agents::find_agent(conn, sender)? {
        let verdict = staleness::evaluate(agent.agent_class, agent.context_updated_at, at);
        if let Some(message) = verdict.message(agent.agent_class) {
            tracing::debug!(sender, "send blocked: stale context");
            return Err(CommsError::Blocked(message));
        }
    }

    Ok(())
}

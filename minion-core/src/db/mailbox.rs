use chrono::Duration;
use rusqlite::{params, Connection, Params, Row};

use super::{agents, flags, gates, get_ts, now, raid, ts, Database};
use crate::error::{CommsError, Result};
use crate::models::*;
use crate::policy::{cc, staleness, triggers};

const MESSAGE_COLUMNS: &str =
    "id, from_agent, to_agent, content, timestamp, read_flag, is_cc, cc_original_to";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get("id")?,
        from_agent: row.get("from_agent")?,
        to_agent: row.get("to_agent")?,
        content: row.get("content")?,
        timestamp: get_ts(row, "timestamp")?,
        read_flag: row.get("read_flag")?,
        is_cc: row.get("is_cc")?,
        cc_original_to: row.get("cc_original_to")?,
    })
}

fn query_messages<P: Params>(conn: &Connection, where_clause: &str, params: P) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages {}",
        MESSAGE_COLUMNS, where_clause
    ))?;
    let messages = stmt
        .query_map(params, message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

impl Database {
    /// Send a direct message or broadcast, subject to the send gates.
    pub fn send(&self, input: SendMessageInput) -> Result<SendReceipt> {
        if input.from_agent.trim().is_empty() || input.to_agent.trim().is_empty() {
            return Err(CommsError::Validation(
                "Both from_agent and to_agent are required.".into(),
            ));
        }
        if input.from_agent == BROADCAST {
            return Err(CommsError::Validation(format!(
                "'{}' is the broadcast sentinel, not a sender.",
                BROADCAST
            )));
        }
        let from = input.from_agent.as_str();
        let to = input.to_agent.as_str();

        self.transaction(|tx| {
            let at = now();
            gates::evaluate_send_gates(tx, from, at)?;

            // Unknown senders fall back to the default class.
            tx.execute(
                "INSERT OR IGNORE INTO agents (name, agent_class, registered_at, last_seen, status)
                 VALUES (?1, 'coder', ?2, ?2, 'waiting for work')",
                params![from, ts(at)],
            )?;

            tx.execute(
                "INSERT INTO messages (from_agent, to_agent, content, timestamp, read_flag, is_cc)
                 VALUES (?1, ?2, ?3, ?4, 0, 0)",
                params![from, to, input.content, ts(at)],
            )?;
            let message_id = tx.last_insert_rowid();

            let lead = agents::first_lead(tx)?;
            let cc_list = cc::fan_out(&input.cc, lead.as_deref(), from, to);
            for recipient in &cc_list {
                tx.execute(
                    "INSERT INTO messages
                        (from_agent, to_agent, content, timestamp, read_flag, is_cc, cc_original_to)
                     VALUES (?1, ?2, ?3, ?4, 0, 1, ?5)",
                    params![from, recipient, input.content, ts(at), to],
                )?;
            }

            agents::touch(tx, from, at)?;

            let found = triggers::scan(&input.content);
            let moon_crash_raised = found.contains(&triggers::Trigger::MoonCrash)
                && flags::raise(tx, MOON_CRASH, from, at)?;
            if moon_crash_raised {
                raid::append(
                    tx,
                    from,
                    &format!(
                        "MOON CRASH raised by {}: {}",
                        from,
                        preview(&input.content, 120)
                    ),
                    RaidPriority::Critical,
                    at,
                )?;
                tracing::warn!(sender = from, "moon_crash flag raised");
            }

            let sender_transport = agents::find_agent(tx, from)?
                .map(|a| a.transport)
                .unwrap_or_default();

            tracing::info!(
                from,
                to,
                message_id,
                cc = cc_list.len(),
                "message sent"
            );
            Ok(SendReceipt {
                message_id,
                from_agent: from.to_string(),
                to_agent: to.to_string(),
                cc: cc_list,
                triggers: found,
                moon_crash_raised,
                sender_transport,
            })
        })
    }

    /// Read and clear everything waiting for `agent`, oldest first.
    pub fn check_inbox(&self, agent: &str) -> Result<Inbox> {
        self.transaction(|tx| {
            let at = now();
            tx.execute(
                "UPDATE agents SET last_seen = ?1, last_inbox_check = ?1 WHERE name = ?2",
                params![ts(at), agent],
            )?;

            let mut direct = query_messages(
                tx,
                "WHERE to_agent = ?1 AND read_flag = 0",
                params![agent],
            )?;
            tx.execute(
                "UPDATE messages SET read_flag = 1 WHERE to_agent = ?1 AND read_flag = 0",
                params![agent],
            )?;
            for message in &mut direct {
                message.read_flag = true;
            }

            let broadcasts = query_messages(
                tx,
                "WHERE to_agent = ?1 AND from_agent != ?2
                   AND id NOT IN (SELECT message_id FROM broadcast_reads WHERE agent_name = ?2)",
                params![BROADCAST, agent],
            )?;
            for message in &broadcasts {
                tx.execute(
                    "INSERT OR IGNORE INTO broadcast_reads (agent_name, message_id) VALUES (?1, ?2)",
                    params![agent, message.id],
                )?;
            }

            let mut messages: Vec<Message> = direct.into_iter().chain(broadcasts).collect();
            messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

            let staleness_warning = agents::find_agent(tx, agent)?.and_then(|a| {
                staleness::evaluate(a.agent_class, a.context_updated_at, at).message(a.agent_class)
            });

            tracing::debug!(agent, count = messages.len(), "inbox checked");
            Ok(Inbox {
                messages: messages.into_iter().map(InboxMessage::from).collect(),
                staleness_warning,
            })
        })
    }

    /// Last `count` messages across all agents, oldest to newest. Read state is untouched.
    pub fn get_history(&self, count: u32) -> Result<Vec<Message>> {
        self.with_connection(|conn| {
            let mut messages = query_messages(
                conn,
                "ORDER BY timestamp DESC, id DESC LIMIT ?1",
                params![count],
            )?;
            messages.reverse();
            Ok(messages)
        })
    }

    /// Delete old direct mail for `agent` and dismiss old broadcasts so
    /// they stop blocking sends.
    pub fn purge_inbox(&self, agent: &str, older_than_hours: u32) -> Result<PurgeOutcome> {
        self.transaction(|tx| {
            let cutoff = ts(now() - Duration::hours(i64::from(older_than_hours)));

            let deleted = tx.execute(
                "DELETE FROM messages WHERE to_agent = ?1 AND timestamp < ?2",
                params![agent, cutoff],
            )?;

            let dismissed = tx.execute(
                "INSERT OR IGNORE INTO broadcast_reads (agent_name, message_id)
                 SELECT ?1, id FROM messages WHERE to_agent = ?2 AND timestamp < ?3",
                params![agent, BROADCAST, cutoff],
            )?;

            tx.execute(
                "DELETE FROM broadcast_reads
                 WHERE agent_name = ?1 AND message_id NOT IN (SELECT id FROM messages)",
                params![agent],
            )?;

            tracing::info!(agent, deleted, dismissed, "inbox purged");
            Ok(PurgeOutcome { deleted, dismissed })
        })
    }

    pub fn unread_count(&self, agent: &str) -> Result<i64> {
        self.with_connection(|conn| Ok(gates::unread_counts(conn, agent)?.total()))
    }
}

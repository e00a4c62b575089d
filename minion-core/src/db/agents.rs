use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{claims, get_enum, get_ts_opt, now, ts, Database};
use crate::error::{CommsError, Result};
use crate::models::*;
use crate::policy::{self, hp::hp_summary, merge::merge_profile, staleness};

const AGENT_COLUMNS: &str = "name, agent_class, model, registered_at, last_seen, last_inbox_check, \
     context_updated_at, description, status, context, context_tokens_used, \
     context_tokens_limit, transport";

/// Every column that stores an agent name. Rename rewrites all of them.
const NAME_REFERENCES: &[(&str, &str)] = &[
    ("agents", "name"),
    ("messages", "from_agent"),
    ("messages", "to_agent"),
    ("messages", "cc_original_to"),
    ("broadcast_reads", "agent_name"),
    ("file_claims", "holder"),
    ("file_waitlist", "agent_name"),
    ("tasks", "assigned_to"),
    ("tasks", "created_by"),
    ("raid_log", "agent_name"),
    ("battle_plan", "set_by"),
    ("fenix_down", "agent_name"),
    ("flags", "set_by"),
];

/// Broadcasts older than this are marked read for a newly registered agent.
const REGISTRATION_BACKLOG_HOURS: i64 = 1;

pub(crate) fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        name: row.get("name")?,
        agent_class: get_enum(row, "agent_class", AgentClass::from_str)?,
        model: row.get("model")?,
        description: row.get("description")?,
        transport: get_enum(row, "transport", Transport::from_str)?,
        status: row.get("status")?,
        context: row.get("context")?,
        context_tokens_used: row.get("context_tokens_used")?,
        context_tokens_limit: row.get("context_tokens_limit")?,
        registered_at: get_ts_opt(row, "registered_at")?,
        last_seen: get_ts_opt(row, "last_seen")?,
        last_inbox_check: get_ts_opt(row, "last_inbox_check")?,
        context_updated_at: get_ts_opt(row, "context_updated_at")?,
    })
}

pub(crate) fn find_agent(conn: &Connection, name: &str) -> Result<Option<Agent>> {
    let agent = conn
        .query_row(
            &format!("SELECT {} FROM agents WHERE name = ?1", AGENT_COLUMNS),
            params![name],
            agent_from_row,
        )
        .optional()?;
    Ok(agent)
}

pub(crate) fn require_agent(conn: &Connection, name: &str) -> Result<Agent> {
    find_agent(conn, name)?.ok_or_else(|| CommsError::agent_not_registered(name))
}

/// Authorization check for lead-only operations. `action` completes
/// "Only lead-class agents can ...".
pub(crate) fn require_lead(conn: &Connection, name: &str, action: &str) -> Result<Agent> {
    let agent = require_agent(conn, name)?;
    if agent.agent_class != AgentClass::Lead {
        return Err(CommsError::Unauthorized(format!(
            "Only lead-class agents can {}. '{}' is class '{}'.",
            action,
            name,
            agent.agent_class.as_str()
        )));
    }
    Ok(agent)
}

/// The lead consulted for auto-CC: the first one registered.
pub(crate) fn first_lead(conn: &Connection) -> Result<Option<String>> {
    let lead = conn
        .query_row(
            "SELECT name FROM agents WHERE agent_class = 'lead'
             ORDER BY registered_at ASC, rowid ASC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(lead)
}

pub(crate) fn touch(conn: &Connection, name: &str, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE agents SET last_seen = ?1 WHERE name = ?2",
        params![ts(at), name],
    )?;
    Ok(())
}

pub(crate) fn view(agent: Agent, at: DateTime<Utc>) -> AgentView {
    let context_stale =
        staleness::evaluate(agent.agent_class, agent.context_updated_at, at).is_stale();
    AgentView {
        hp: hp_summary(agent.context_tokens_used, agent.context_tokens_limit),
        context_stale,
        last_seen_mins_ago: agent.last_seen.map(|seen| (at - seen).num_minutes()),
        agent,
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CommsError::Validation("Agent name must not be empty.".into()));
    }
    if name == BROADCAST {
        return Err(CommsError::Validation(format!(
            "'{}' is reserved for broadcasts and cannot be an agent name.",
            BROADCAST
        )));
    }
    Ok(())
}

fn profile_of(agent: &Agent) -> AgentProfile {
    AgentProfile {
        agent_class: agent.agent_class,
        model: agent.model.clone(),
        description: agent.description.clone(),
        transport: agent.transport,
    }
}

impl Database {
    /// Create or refresh an agent record.
    pub fn register(&self, input: RegisterAgentInput) -> Result<Registration> {
        validate_name(&input.name)?;
        policy::check_model(input.agent_class, input.model.as_deref())?;

        self.transaction(|tx| {
            let at = now();
            let existing = find_agent(tx, &input.name)?;
            let profile = merge_profile(
                existing.as_ref().map(profile_of).as_ref(),
                AgentProfile {
                    agent_class: input.agent_class,
                    model: input.model.clone(),
                    description: input.description.clone(),
                    transport: input.transport,
                },
            );
            // A kept model must still suit the (possibly new) class.
            policy::check_model(profile.agent_class, profile.model.as_deref())?;

            if existing.is_some() {
                tx.execute(
                    "UPDATE agents SET agent_class = ?1, model = ?2, description = ?3,
                            transport = ?4, last_seen = ?5, status = 'waiting for work'
                     WHERE name = ?6",
                    params![
                        profile.agent_class.as_str(),
                        profile.model,
                        profile.description,
                        profile.transport.as_str(),
                        ts(at),
                        input.name,
                    ],
                )?;
            } else {
                tx.execute(
                    "INSERT INTO agents (name, agent_class, model, description, transport,
                                         registered_at, last_seen, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 'waiting for work')",
                    params![
                        input.name,
                        profile.agent_class.as_str(),
                        profile.model,
                        profile.description,
                        profile.transport.as_str(),
                        ts(at),
                    ],
                )?;
            }

            let cutoff = at - Duration::hours(REGISTRATION_BACKLOG_HOURS);
            tx.execute(
                "INSERT OR IGNORE INTO broadcast_reads (agent_name, message_id)
                 SELECT ?1, id FROM messages WHERE to_agent = ?2 AND timestamp < ?3",
                params![input.name, BROADCAST, ts(cutoff)],
            )?;

            let agent = require_agent(tx, &input.name)?;
            tracing::info!(
                agent = %agent.name,
                class = agent.agent_class.as_str(),
                created = existing.is_none(),
                "agent registered"
            );
            Ok(Registration {
                agent,
                created: existing.is_none(),
            })
        })
    }

    /// Remove an agent. Releases its claims, reports who was waiting on
    /// them, and takes it off every waitlist. Message history stays; its
    /// broadcast read markers go.
    pub fn deregister(&self, name: &str) -> Result<Deregistration> {
        self.transaction(|tx| {
            require_agent(tx, name)?;
            let left_waitlists = claims::leave_all_waitlists(tx, name)?;
            let released = claims::release_all_held(tx, name)?;
            tx.execute("DELETE FROM broadcast_reads WHERE agent_name = ?1", params![name])?;
            tx.execute("DELETE FROM agents WHERE name = ?1", params![name])?;

            tracing::info!(
                agent = name,
                released = released.len(),
                "agent deregistered"
            );
            Ok(Deregistration {
                name: name.to_string(),
                released,
                left_waitlists,
            })
        })
    }

    /// Move an identity to a new name, rewriting every reference to it.
    pub fn rename(&self, old_name: &str, new_name: &str) -> Result<Agent> {
        validate_name(new_name)?;
        self.transaction(|tx| {
            if find_agent(tx, old_name)?.is_none() {
                return Err(CommsError::NotFound(format!(
                    "Agent '{}' not found.",
                    old_name
                )));
            }
            if find_agent(tx, new_name)?.is_some() {
                return Err(CommsError::Blocked(format!(
                    "Agent '{}' already exists. Choose a different name.",
                    new_name
                )));
            }

            // Read markers left behind under a freed name belong to nobody.
            tx.execute(
                "DELETE FROM broadcast_reads WHERE agent_name = ?1",
                params![new_name],
            )?;
            for (table, column) in NAME_REFERENCES {
                tx.execute(
                    &format!("UPDATE {table} SET {column} = ?1 WHERE {column} = ?2"),
                    params![new_name, old_name],
                )?;
            }

            tracing::info!(from = old_name, to = new_name, "agent renamed");
            require_agent(tx, new_name)
        })
    }

    pub fn set_status(&self, name: &str, status: &str) -> Result<Agent> {
        self.transaction(|tx| {
            let changed = tx.execute(
                "UPDATE agents SET status = ?1, last_seen = ?2 WHERE name = ?3",
                params![status, ts(now()), name],
            )?;
            if changed == 0 {
                return Err(CommsError::agent_not_registered(name));
            }
            require_agent(tx, name)
        })
    }

    /// Record what the agent has loaded. The only call that resets the staleness clock.
    pub fn set_context(&self, name: &str, input: SetContextInput) -> Result<Agent> {
        self.transaction(|tx| {
            let at = ts(now());
            let changed = tx.execute(
                "UPDATE agents
                 SET context = ?1,
                     context_tokens_used = NULLIF(?2, 0),
                     context_tokens_limit = NULLIF(?3, 0),
                     context_updated_at = ?4,
                     last_seen = ?4
                 WHERE name = ?5",
                params![input.context, input.tokens_used, input.tokens_limit, at, name],
            )?;
            if changed == 0 {
                return Err(CommsError::agent_not_registered(name));
            }
            require_agent(tx, name)
        })
    }

    pub fn get_agent(&self, name: &str) -> Result<Agent> {
        self.with_connection(|conn| require_agent(conn, name))
    }

    /// All agents, most recently seen first.
    pub fn who(&self) -> Result<Vec<AgentView>> {
        self.with_connection(|conn| {
            let at = now();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM agents ORDER BY last_seen DESC",
                AGENT_COLUMNS
            ))?;
            let agents = stmt
                .query_map([], agent_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(agents.into_iter().map(|a| view(a, at)).collect())
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::Transport;
use crate::policy::triggers::Trigger;

/// Recipient sentinel for broadcasts.
pub const BROADCAST: &str = "all";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub from_agent: String,
    pub to_agent: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub read_flag: bool,
    pub is_cc: bool,
    pub cc_original_to: Option<String>,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.to_agent == BROADCAST
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageInput {
    pub from_agent: String,
    pub to_agent: String,
    pub content: String,
    #[serde(default)]
    pub cc: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub message_id: i64,
    pub from_agent: String,
    pub to_agent: String,
    /// Agents that received a CC copy, in delivery order.
    pub cc: Vec<String>,
    pub triggers: Vec<Trigger>,
    /// True when this send raised the emergency flag.
    pub moon_crash_raised: bool,
    pub sender_transport: Transport,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxMessage {
    #[serde(flatten)]
    pub message: Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc_note: Option<String>,
}

impl From<Message> for InboxMessage {
    fn from(message: Message) -> Self {
        let cc_note = message.is_cc.then(|| {
            format!(
                "[CC] originally to: {}",
                message.cc_original_to.as_deref().unwrap_or("unknown")
            )
        });
        Self { message, cc_note }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Inbox {
    pub messages: Vec<InboxMessage>,
    /// Set when the agent's context is stale. Reading is never blocked.
    pub staleness_warning: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub deleted: usize,
    pub dismissed: usize,
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CommsError, Result};
use crate::policy::hp::HpSummary;

/// Role category of an agent. Controls authorization and staleness threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentClass {
    Lead,
    Coder,
    Builder,
    Oracle,
    Recon,
}

impl AgentClass {
    pub const ALL: [AgentClass; 5] = [
        Self::Builder,
        Self::Coder,
        Self::Lead,
        Self::Oracle,
        Self::Recon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Coder => "coder",
            Self::Builder => "builder",
            Self::Oracle => "oracle",
            Self::Recon => "recon",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "lead" => Some(Self::Lead),
            "coder" => Some(Self::Coder),
            "builder" => Some(Self::Builder),
            "oracle" => Some(Self::Oracle),
            "recon" => Some(Self::Recon),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            CommsError::Validation(format!(
                "Unknown class '{}'. Valid classes: {}",
                s,
                join(Self::ALL.iter().map(|c| c.as_str()))
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Human-driven CLI session. Needs a poller to notice new mail.
    #[default]
    Terminal,
    /// Swarm-managed process; the supervisor delivers mail.
    Daemon,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::Daemon => "daemon",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "terminal" => Some(Self::Terminal),
            "daemon" => Some(Self::Daemon),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            CommsError::Validation(format!(
                "Invalid transport '{}'. Must be 'terminal' or 'daemon'.",
                s
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub agent_class: AgentClass,
    pub model: Option<String>,
    pub description: Option<String>,
    pub transport: Transport,
    pub status: Option<String>,
    pub context: Option<String>,
    pub context_tokens_used: Option<i64>,
    pub context_tokens_limit: Option<i64>,
    pub registered_at: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_inbox_check: Option<DateTime<Utc>>,
    pub context_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAgentInput {
    pub name: String,
    pub agent_class: AgentClass,
    pub model: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub transport: Transport,
}

/// The mergeable part of an agent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_class: AgentClass,
    pub model: Option<String>,
    pub description: Option<String>,
    pub transport: Transport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub agent: Agent,
    /// False when an existing record was refreshed.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContextInput {
    pub context: String,
    #[serde(default)]
    pub tokens_used: i64,
    #[serde(default)]
    pub tokens_limit: i64,
}

/// Directory listing entry: the agent plus derived health fields.
#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    #[serde(flatten)]
    pub agent: Agent,
    pub hp: Option<HpSummary>,
    pub context_stale: bool,
    pub last_seen_mins_ago: Option<i64>,
}

pub(crate) fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::join;
use crate::error::{CommsError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum RaidPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl RaidPriority {
    pub const ALL: [RaidPriority; 4] = [Self::Critical, Self::High, Self::Low, Self::Normal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            CommsError::Validation(format!(
                "Invalid priority '{}'. Valid: {}",
                s,
                join(Self::ALL.iter().map(|p| p.as_str()))
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidLogEntry {
    pub id: i64,
    pub agent_name: String,
    pub entry: String,
    pub priority: RaidPriority,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidLogFilter {
    pub priority: Option<RaidPriority>,
    pub agent_name: Option<String>,
    pub count: u32,
}

impl Default for RaidLogFilter {
    fn default() -> Self {
        Self {
            priority: None,
            agent_name: None,
            count: 20,
        }
    }
}

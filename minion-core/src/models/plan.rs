use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::join;
use crate::error::{CommsError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Superseded,
    Completed,
    Abandoned,
    Obsolete,
}

impl PlanStatus {
    pub const ALL: [PlanStatus; 5] = [
        Self::Abandoned,
        Self::Active,
        Self::Completed,
        Self::Obsolete,
        Self::Superseded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Obsolete => "obsolete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "superseded" => Some(Self::Superseded),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            "obsolete" => Some(Self::Obsolete),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            CommsError::Validation(format!(
                "Invalid status '{}'. Valid: {}",
                s,
                join(Self::ALL.iter().map(|p| p.as_str()))
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlePlan {
    pub id: i64,
    pub set_by: String,
    pub plan: String,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PlanStatusChange {
    pub plan_id: i64,
    pub from: PlanStatus,
    pub to: PlanStatus,
    /// Plan demoted to `superseded` because another plan was made active.
    pub superseded: Option<i64>,
}

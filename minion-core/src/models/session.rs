use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentView, BattlePlan, ClaimView, RaidLogEntry, Task};

/// Knowledge dump filed by an agent before it loses its context window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FenixDownRecord {
    pub id: i64,
    pub agent_name: String,
    pub files: Vec<String>,
    pub manifest: String,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FenixDownInput {
    #[serde(default)]
    pub files: Vec<String>,
    pub manifest: String,
}

/// Everything an agent needs to resume work after a restart or compaction.
#[derive(Debug, Clone, Serialize)]
pub struct ColdStart {
    pub agent: AgentView,
    pub battle_plan: Option<BattlePlan>,
    pub recent_raid_log: Vec<RaidLogEntry>,
    pub tasks: Vec<Task>,
    pub claims: Vec<ClaimView>,
    pub unread_count: i64,
    pub moon_crash: bool,
    /// Records handed over by this call. They will not be returned again.
    pub fenix_down: Vec<FenixDownRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEnd {
    pub ended_by: String,
    pub completed_plan: Option<i64>,
    pub active_tasks: i64,
    pub held_claims: i64,
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AgentView, BattlePlan};
use crate::policy::liveness::Liveness;

#[derive(Debug, Clone, Serialize)]
pub struct PartyMember {
    #[serde(flatten)]
    pub view: AgentView,
    pub liveness: Liveness,
    pub claimed_files: Vec<String>,
    pub active_tasks: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyStatus {
    pub battle_plan: Option<BattlePlan>,
    pub moon_crash: bool,
    pub members: Vec<PartyMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityReport {
    pub agent_name: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_task_update: Option<DateTime<Utc>>,
    pub last_file_write: Option<DateTime<Utc>>,
    pub liveness: Liveness,
}

#[derive(Debug, Clone, Serialize)]
pub struct FreshnessReport {
    pub agent_name: String,
    pub context_updated_at: Option<DateTime<Utc>>,
    pub context_stale: bool,
    pub staleness_message: Option<String>,
    /// Claimed files and zone directories modified after the last `set_context`.
    pub changed_since_context: Vec<ChangedPath>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangedPath {
    pub path: String,
    pub modified_at: DateTime<Utc>,
}

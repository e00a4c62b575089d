//! Tool parameter types. Enum-valued fields arrive as strings and are parsed
//! by the core so that a bad value comes back as a readable rejection.

use rmcp::schemars::JsonSchema;
use serde::Deserialize;

fn default_transport() -> String {
    "terminal".into()
}

fn default_history_count() -> u32 {
    20
}

fn default_purge_hours() -> u32 {
    2
}

fn default_plan_status() -> String {
    "active".into()
}

fn default_priority() -> String {
    "normal".into()
}

fn default_raid_count() -> u32 {
    20
}

fn default_task_count() -> u32 {
    50
}

// --- Agent directory ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RegisterRequest {
    #[schemars(description = "Unique agent name")]
    pub agent_name: String,
    #[schemars(description = "One of: lead, coder, builder, oracle, recon")]
    pub agent_class: String,
    #[schemars(description = "Model identifier. Lead and coder are restricted to large models")]
    #[serde(default)]
    pub model: String,
    #[schemars(description = "What this agent is for")]
    #[serde(default)]
    pub description: String,
    #[schemars(description = "'terminal' (human CLI, needs poll.sh) or 'daemon' (swarm-managed)")]
    #[serde(default = "default_transport")]
    pub transport: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AgentRequest {
    #[schemars(description = "The calling agent's name")]
    pub agent_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenameRequest {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetStatusRequest {
    pub agent_name: String,
    #[schemars(description = "Free-form status line, e.g. 'working on #12'")]
    pub status: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetContextRequest {
    pub agent_name: String,
    #[schemars(description = "One-line summary of what you have loaded")]
    pub context: String,
    #[schemars(description = "Tokens used in your context window, 0 if unknown")]
    #[serde(default)]
    pub tokens_used: i64,
    #[schemars(description = "Size of your context window, 0 if unknown")]
    #[serde(default)]
    pub tokens_limit: i64,
}

// --- Mailbox ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendRequest {
    pub from_agent: String,
    #[schemars(description = "Recipient name, or 'all' to broadcast")]
    pub to_agent: String,
    pub message: String,
    #[schemars(description = "Comma-separated extra recipients")]
    #[serde(default)]
    pub cc: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetHistoryRequest {
    #[serde(default = "default_history_count")]
    pub count: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PurgeInboxRequest {
    pub agent_name: String,
    #[schemars(description = "Delete messages older than this many hours")]
    #[serde(default = "default_purge_hours")]
    pub older_than_hours: u32,
}

// --- Battle plan and raid log ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetBattlePlanRequest {
    pub agent_name: String,
    pub plan: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetBattlePlanRequest {
    #[schemars(description = "One of: active, superseded, completed, abandoned, obsolete")]
    #[serde(default = "default_plan_status")]
    pub status: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateBattlePlanStatusRequest {
    pub agent_name: String,
    pub plan_id: i64,
    pub status: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogRaidRequest {
    pub agent_name: String,
    pub entry: String,
    #[schemars(description = "One of: low, normal, high, critical")]
    #[serde(default = "default_priority")]
    pub priority: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetRaidLogRequest {
    #[serde(default)]
    pub priority: String,
    #[serde(default = "default_raid_count")]
    pub count: u32,
    #[serde(default)]
    pub agent_name: String,
}

// --- Tasks ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskRequest {
    pub agent_name: String,
    pub title: String,
    #[schemars(description = "Path to the task spec file. Must exist")]
    pub task_file: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub zone: String,
    #[schemars(description = "Comma-separated task ids this task depends on")]
    #[serde(default)]
    pub blocked_by: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AssignTaskRequest {
    pub agent_name: String,
    pub task_id: i64,
    pub assigned_to: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskRequest {
    pub agent_name: String,
    pub task_id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: String,
    #[schemars(description = "Comma-separated files touched")]
    #[serde(default)]
    pub files: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTasksRequest {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub assigned_to: String,
    #[serde(default = "default_task_count")]
    pub count: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskIdRequest {
    pub task_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskActionRequest {
    pub agent_name: String,
    pub task_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitResultRequest {
    pub agent_name: String,
    pub task_id: i64,
    #[schemars(description = "Path to the result file. Must exist")]
    pub result_file: String,
}

// --- File claims ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClaimFileRequest {
    pub agent_name: String,
    pub file_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReleaseFileRequest {
    pub agent_name: String,
    pub file_path: String,
    #[schemars(description = "Lead only: release a claim held by someone else")]
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetClaimsRequest {
    #[schemars(description = "Only claims held by this agent")]
    #[serde(default)]
    pub agent_name: String,
}

// --- Session ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FenixDownRequest {
    pub agent_name: String,
    #[schemars(description = "Comma-separated files the next session should re-read")]
    #[serde(default)]
    pub files: String,
    #[schemars(description = "What you knew: decisions, open threads, gotchas")]
    pub manifest: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DebriefRequest {
    pub agent_name: String,
    pub debrief_file: String,
}

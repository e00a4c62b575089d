use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::join;
use crate::error::{CommsError, Result};

/// Activity count at which a task is reported as dragging.
pub const DRAGGING_THRESHOLD: i64 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Assigned,
    InProgress,
    Fixed,
    Verified,
    Closed,
    Abandoned,
    Stale,
    Obsolete,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 9] = [
        Self::Abandoned,
        Self::Assigned,
        Self::Closed,
        Self::Fixed,
        Self::InProgress,
        Self::Obsolete,
        Self::Open,
        Self::Stale,
        Self::Verified,
    ];

    /// Statuses listed by `get_tasks` when no status filter is given.
    pub const ACTIVE: [TaskStatus; 3] = [Self::Open, Self::Assigned, Self::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Fixed => "fixed",
            Self::Verified => "verified",
            Self::Closed => "closed",
            Self::Abandoned => "abandoned",
            Self::Stale => "stale",
            Self::Obsolete => "obsolete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "fixed" => Some(Self::Fixed),
            "verified" => Some(Self::Verified),
            "closed" => Some(Self::Closed),
            "abandoned" => Some(Self::Abandoned),
            "stale" => Some(Self::Stale),
            "obsolete" => Some(Self::Obsolete),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| {
            CommsError::Validation(format!(
                "Invalid status '{}'. Valid: {}",
                s,
                join(Self::ALL.iter().map(|t| t.as_str()))
            ))
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub task_file: String,
    pub project: Option<String>,
    pub zone: Option<String>,
    pub status: TaskStatus,
    pub blocked_by: Vec<i64>,
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub files: Vec<String>,
    pub progress: Option<String>,
    pub activity_count: i64,
    pub result_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_dragging(&self) -> bool {
        self.activity_count >= DRAGGING_THRESHOLD
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    pub task_file: String,
    pub project: Option<String>,
    pub zone: Option<String>,
    #[serde(default)]
    pub blocked_by: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskInput {
    pub status: Option<TaskStatus>,
    pub progress: Option<String>,
    pub files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub project: Option<String>,
    pub zone: Option<String>,
    pub assigned_to: Option<String>,
    pub count: u32,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status: None,
            project: None,
            zone: None,
            assigned_to: None,
            count: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskAssignment {
    pub task: Task,
    /// Blockers not yet closed. Advisory only, never enforced.
    pub unresolved_blockers: Vec<i64>,
}

/// Parse a comma-separated list of task ids, skipping empty entries.
pub fn parse_task_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                CommsError::Validation(format!(
                    "Invalid task ID in blocked_by: '{}'. Must be integers.",
                    s
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_task_ids_skips_blanks() {
        assert_eq!(parse_task_ids(" 1, ,3,").unwrap(), vec![1, 3]);
        assert!(parse_task_ids("").unwrap().is_empty());
    }

    #[test]
    fn parse_task_ids_rejects_non_integers() {
        let err = parse_task_ids("1,two").unwrap_err();
        assert!(err.to_string().contains("'two'"));
    }

    #[test]
    fn status_names_round_trip_through_parse() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TaskStatus::parse("done").is_err());
    }
}

//! Error type shared by every kernel operation.
//!
//! Rejections (validation, authorization, gates, missing records) are
//! ordinary values the tool layer hands back to the calling agent. Only the
//! transparent variants represent faults in the store or the filesystem.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CommsError>;

#[derive(Debug, Error)]
pub enum CommsError {
    /// Malformed input: unknown class, status, priority, transport, bad id list.
    #[error("{0}")]
    Validation(String),

    /// A class-gated operation attempted by the wrong class.
    #[error("{0}")]
    Unauthorized(String),

    /// A precondition or gate failed. The message says how to satisfy it.
    #[error("{0}")]
    Blocked(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CommsError {
    /// True for rejections the caller can fix and retry; false for store faults.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Unauthorized(_) | Self::Blocked(_) | Self::NotFound(_)
        )
    }

    pub(crate) fn agent_not_registered(name: &str) -> Self {
        Self::NotFound(format!("Agent '{}' not registered.", name))
    }

    pub(crate) fn task_not_found(id: i64) -> Self {
        Self::NotFound(format!("Task #{} not found.", id))
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileClaim {
    pub file_path: String,
    pub holder: String,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimView {
    #[serde(flatten)]
    pub claim: FileClaim,
    /// Waiting agents, first in line first.
    pub waitlist: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Granted { claim: FileClaim },
    /// The caller already held the path; nothing changed.
    AlreadyHeld { claim: FileClaim },
    /// Held by someone else. The caller now sits in the waitlist at `position` (1-based).
    Waitlisted {
        file_path: String,
        holder: String,
        position: usize,
    },
}

impl ClaimOutcome {
    pub fn is_granted(&self) -> bool {
        !matches!(self, Self::Waitlisted { .. })
    }
}

/// A claim that was dropped, with the agents who were waiting for it.
///
/// The waitlist is advisory: nobody is handed the claim automatically.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasedClaim {
    pub file_path: String,
    pub released_by: String,
    pub previous_holder: String,
    pub waitlist: Vec<String>,
}

impl ReleasedClaim {
    pub fn next_in_line(&self) -> Option<&str> {
        self.waitlist.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Deregistration {
    pub name: String,
    pub released: Vec<ReleasedClaim>,
    /// Paths whose waitlist the agent was removed from.
    pub left_waitlists: Vec<String>,
}

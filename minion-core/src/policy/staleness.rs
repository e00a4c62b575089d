use chrono::{DateTime, Utc};

use super::staleness_threshold;
use crate::models::AgentClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// Class has no threshold.
    Exempt,
    Fresh,
    NeverSet { threshold_secs: i64 },
    Stale { age_secs: i64, threshold_secs: i64 },
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::NeverSet { .. } | Self::Stale { .. })
    }

    /// Blocking message for `send`, or `None` when fresh.
    pub fn message(&self, class: AgentClass) -> Option<String> {
        match self {
            Self::Exempt | Self::Fresh => None,
            Self::NeverSet { threshold_secs } => Some(format!(
                "Context not set. Call set_context before sending. ({} threshold: {} min)",
                class.as_str(),
                threshold_secs / 60
            )),
            Self::Stale {
                age_secs,
                threshold_secs,
            } => Some(format!(
                "Context stale ({}m old, threshold {}m for {}). \
                 Call set_context to update your metrics before sending.",
                age_secs / 60,
                threshold_secs / 60,
                class.as_str()
            )),
        }
    }
}

/// Staleness is computed at read time: `now - context_updated_at` against the class threshold.
pub fn evaluate(
    class: AgentClass,
    context_updated_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Staleness {
    let Some(threshold_secs) = staleness_threshold(class) else {
        return Staleness::Exempt;
    };
    match context_updated_at {
        None => Staleness::NeverSet { threshold_secs },
        Some(updated) => {
            let age_secs = (now - updated).num_seconds();
            if age_secs > threshold_secs {
                Staleness::Stale {
                    age_secs,
                    threshold_secs,
                }
            } else {
                Staleness::Fresh
            }
        }
    }
}

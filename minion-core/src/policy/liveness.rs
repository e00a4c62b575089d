use chrono::{DateTime, Utc};
use serde::Serialize;

/// Signal age up to which an agent counts as active.
pub const ACTIVE_SECS: i64 = 10 * 60;
/// Signal age up to which an agent counts as idle; older is possibly dead.
pub const IDLE_SECS: i64 = 30 * 60;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    Active,
    Idle,
    PossiblyDead,
    Unknown,
}

/// Which timestamp the judgement was based on. Declared in tie-break order.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    FileWrite,
    TaskUpdate,
    LastSeen,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Liveness {
    pub state: LivenessState,
    pub source: Option<Signal>,
    pub age_secs: Option<i64>,
}

/// Judge whether an agent is alive from its freshest activity signal.
///
/// The newest timestamp wins. On equal timestamps the earlier signal in
/// `Signal` order is reported.
pub fn judge(
    now: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
    last_task_update: Option<DateTime<Utc>>,
    last_file_write: Option<DateTime<Utc>>,
) -> Liveness {
    let candidates = [
        (Signal::FileWrite, last_file_write),
        (Signal::TaskUpdate, last_task_update),
        (Signal::LastSeen, last_seen),
    ];

    let mut freshest: Option<(Signal, DateTime<Utc>)> = None;
    for (signal, at) in candidates {
        let Some(at) = at else { continue };
        match freshest {
            Some((_, best)) if best >= at => {}
            _ => freshest = Some((signal, at)),
        }
    }

    let Some((source, at)) = freshest else {
        return Liveness {
            state: LivenessState::Unknown,
            source: None,
            age_secs: None,
        };
    };

    let age_secs = (now - at).num_seconds().max(0);
    let state = if age_secs <= ACTIVE_SECS {
        LivenessState::Active
    } else if age_secs <= IDLE_SECS {
        LivenessState::Idle
    } else {
        LivenessState::PossiblyDead
    };

    Liveness {
        state,
        source: Some(source),
        age_secs: Some(age_secs),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::triggers::TriggerInfo;

/// Flag key raised by the `moon_crash` trigger word.
pub const MOON_CRASH: &str = "moon_crash";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyFlag {
    pub key: String,
    pub value: bool,
    pub set_by: Option<String>,
    pub set_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerBoard {
    pub triggers: Vec<TriggerInfo>,
    pub flags: Vec<EmergencyFlag>,
}

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Healthy,
    Wounded,
    Critical,
}

/// Remaining context budget of an agent.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct HpSummary {
    pub hp_pct: f64,
    pub tokens_used: i64,
    pub tokens_limit: i64,
    pub condition: Condition,
}

/// `None` when either side of the budget is unknown or zero.
pub fn hp_summary(tokens_used: Option<i64>, tokens_limit: Option<i64>) -> Option<HpSummary> {
    let used = tokens_used.filter(|v| *v > 0)?;
    let limit = tokens_limit.filter(|v| *v > 0)?;
    let hp_pct = 100.0 - (used as f64 / limit as f64 * 100.0);
    let condition = if hp_pct > 50.0 {
        Condition::Healthy
    } else if hp_pct > 25.0 {
        Condition::Wounded
    } else {
        Condition::Critical
    };
    Some(HpSummary {
        hp_pct,
        tokens_used: used,
        tokens_limit: limit,
        condition,
    })
}

impl fmt::Display for HpSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.condition {
            Condition::Healthy => "Healthy",
            Condition::Wounded => "Wounded",
            Condition::Critical => "CRITICAL",
        };
        write!(
            f,
            "{:.0}% HP [{}k/{}k] - {}",
            self.hp_pct,
            self.tokens_used / 1000,
            self.tokens_limit / 1000,
            label
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_remaining_budget() {
        let hp = hp_summary(Some(110_000), Some(200_000)).unwrap();
        assert_eq!(hp.condition, Condition::Wounded);
        assert_eq!(hp.to_string(), "45% HP [110k/200k] - Wounded");
    }

    #[test]
    fn unknown_without_both_numbers() {
        assert!(hp_summary(None, Some(200_000)).is_none());
        assert!(hp_summary(Some(0), Some(200_000)).is_none());
    }

    #[test]
    fn critical_below_a_quarter() {
        let hp = hp_summary(Some(190_000), Some(200_000)).unwrap();
        assert_eq!(hp.condition, Condition::Critical);
    }
}

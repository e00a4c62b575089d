use serde::Serialize;

/// Fixed trigger vocabulary scanned in every sent message.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    MoonCrash,
    FenixDown,
    Recon,
    Sitrep,
    Rally,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerInfo {
    pub word: &'static str,
    pub effect: &'static str,
    pub enforced: bool,
}

impl Trigger {
    pub const ALL: [Trigger; 5] = [
        Self::MoonCrash,
        Self::FenixDown,
        Self::Recon,
        Self::Sitrep,
        Self::Rally,
    ];

    pub fn word(&self) -> &'static str {
        match self {
            Self::MoonCrash => "moon_crash",
            Self::FenixDown => "fenix_down",
            Self::Recon => "recon",
            Self::Sitrep => "sitrep",
            Self::Rally => "rally",
        }
    }

    pub fn effect(&self) -> &'static str {
        match self {
            Self::MoonCrash => {
                "Emergency halt. Blocks assign_task until a lead calls clear_moon_crash."
            }
            Self::FenixDown => "Sender is about to lose context. Dump knowledge with fenix_down.",
            Self::Recon => "Investigation requested. Consider assigning a recon agent.",
            Self::Sitrep => "Status report requested. Reply with your current status.",
            Self::Rally => "All agents regroup: check_inbox and re-read the battle plan.",
        }
    }

    /// Only `moon_crash` has an enforced side effect; the rest are annotations.
    pub fn is_enforced(&self) -> bool {
        matches!(self, Self::MoonCrash)
    }

    pub fn info(&self) -> TriggerInfo {
        TriggerInfo {
            word: self.word(),
            effect: self.effect(),
            enforced: self.is_enforced(),
        }
    }
}

/// Case-insensitive substring scan. Matches inside longer words too, so
/// "reconnaissance" fires `recon`.
pub fn scan(text: &str) -> Vec<Trigger> {
    let lowered = text.to_lowercase();
    Trigger::ALL
        .into_iter()
        .filter(|t| lowered.contains(t.word()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_case_insensitively() {
        assert_eq!(scan("MOON_CRASH now"), vec![Trigger::MoonCrash]);
    }

    #[test]
    fn substring_inside_longer_word_fires() {
        assert_eq!(scan("starting reconnaissance"), vec![Trigger::Recon]);
    }

    #[test]
    fn several_triggers_in_vocabulary_order() {
        assert_eq!(
            scan("rally for a sitrep before fenix_down"),
            vec![Trigger::FenixDown, Trigger::Sitrep, Trigger::Rally]
        );
    }

    #[test]
    fn only_moon_crash_is_enforced() {
        let enforced: Vec<Trigger> = Trigger::ALL
            .into_iter()
            .filter(Trigger::is_enforced)
            .collect();
        assert_eq!(enforced, vec![Trigger::MoonCrash]);
        assert!(Trigger::MoonCrash.info().enforced);
        assert!(!Trigger::Rally.info().enforced);
    }

    #[test]
    fn plain_text_is_quiet() {
        assert!(scan("tests pass, pushing the branch").is_empty());
    }
}

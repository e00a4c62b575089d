//! Pure policy functions. Nothing in here touches the database or the clock;
//! callers pass `now` and the stored values in.

pub mod cc;
pub mod hp;
pub mod liveness;
pub mod merge;
pub mod paths;
pub mod staleness;
pub mod triggers;

use crate::error::{CommsError, Result};
use crate::models::AgentClass;

/// Models a lead or coder may run on. Other classes accept any model.
const LARGE_MODELS: &[&str] = &[
    "claude-opus-4-5",
    "claude-opus-4-6",
    "claude-sonnet-4-5",
    "claude-sonnet-4-6",
    "gemini-1.5-pro",
    "gemini-2.0-pro",
    "gemini-pro",
];

/// Allowed models for a class. An empty slice means unrestricted.
pub fn allowed_models(class: AgentClass) -> &'static [&'static str] {
    match class {
        AgentClass::Lead | AgentClass::Coder => LARGE_MODELS,
        AgentClass::Builder | AgentClass::Oracle | AgentClass::Recon => &[],
    }
}

/// Reject a self-reported model the class is not allowed to run on.
/// A missing or empty model is not checked.
pub fn check_model(class: AgentClass, model: Option<&str>) -> Result<()> {
    let allowed = allowed_models(class);
    match model.filter(|m| !m.is_empty()) {
        Some(model) if !allowed.is_empty() && !allowed.contains(&model) => {
            Err(CommsError::Validation(format!(
                "Model '{}' is not allowed for class '{}'. Allowed: {}",
                model,
                class.as_str(),
                allowed.join(", ")
            )))
        }
        _ => Ok(()),
    }
}

/// Seconds after the last `set_context` before a class is blocked from sending.
/// `None` means the class is never gated.
pub fn staleness_threshold(class: AgentClass) -> Option<i64> {
    match class {
        AgentClass::Coder | AgentClass::Builder | AgentClass::Recon => Some(5 * 60),
        AgentClass::Lead => Some(15 * 60),
        AgentClass::Oracle => Some(30 * 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_rejects_small_models() {
        let err = check_model(AgentClass::Lead, Some("claude-haiku-4-5")).unwrap_err();
        assert!(err.to_string().contains("not allowed for class 'lead'"));
        assert!(check_model(AgentClass::Lead, Some("claude-opus-4-6")).is_ok());
    }

    #[test]
    fn unrestricted_classes_accept_anything() {
        assert!(check_model(AgentClass::Builder, Some("claude-haiku-4-5")).is_ok());
        assert!(check_model(AgentClass::Recon, Some("anything")).is_ok());
    }

    #[test]
    fn empty_model_skips_the_check() {
        assert!(check_model(AgentClass::Coder, Some("")).is_ok());
        assert!(check_model(AgentClass::Coder, None).is_ok());
    }
}

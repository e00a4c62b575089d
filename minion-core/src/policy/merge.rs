use crate::models::AgentProfile;

/// Resolve a re-registration against the stored profile.
///
/// Class and transport always follow the incoming registration. Model and
/// description keep the stored value unless the incoming one is non-empty.
pub fn merge_profile(existing: Option<&AgentProfile>, incoming: AgentProfile) -> AgentProfile {
    let Some(existing) = existing else {
        return AgentProfile {
            model: non_empty(incoming.model),
            description: non_empty(incoming.description),
            ..incoming
        };
    };

    AgentProfile {
        agent_class: incoming.agent_class,
        transport: incoming.transport,
        model: non_empty(incoming.model).or_else(|| existing.model.clone()),
        description: non_empty(incoming.description).or_else(|| existing.description.clone()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

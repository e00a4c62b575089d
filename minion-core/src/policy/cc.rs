use crate::models::BROADCAST;

/// Compute who receives a CC copy of a message.
///
/// Explicit entries are trimmed, blanks dropped and duplicates removed in
/// order. The lead is appended unless the lead is the sender or the recipient.
/// Broadcasts already reach the lead, so they never auto-CC. The primary
/// recipient never receives a second copy.
pub fn fan_out(explicit: &[String], lead: Option<&str>, from: &str, to: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();
    for name in explicit.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !recipients.iter().any(|r| r == name) {
            recipients.push(name.to_string());
        }
    }

    if let Some(lead) = lead {
        let lead_involved = lead == from || lead == to;
        if !lead_involved && to != BROADCAST && !recipients.iter().any(|r| r == lead) {
            recipients.push(lead.to_string());
        }
    }

    recipients.retain(|r| r != to);
    recipients
}

/// Split a comma-separated CC field.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lead_is_auto_copied() {
        let cc = fan_out(&[], Some("boss"), "coder-1", "coder-2");
        assert_eq!(cc, names(&["boss"]));
    }

    #[test]
    fn no_copy_when_lead_is_recipient_or_sender() {
        assert!(fan_out(&[], Some("boss"), "coder-1", "boss").is_empty());
        assert!(fan_out(&[], Some("boss"), "boss", "coder-1").is_empty());
    }

    #[test]
    fn explicit_list_is_deduplicated_and_skips_recipient() {
        let explicit = names(&[" oracle ", "", "coder-2", "oracle", "boss"]);
        let cc = fan_out(&explicit, Some("boss"), "coder-1", "coder-2");
        assert_eq!(cc, names(&["oracle", "boss"]));
    }

    #[test]
    fn broadcasts_do_not_auto_copy_lead() {
        assert!(fan_out(&[], Some("boss"), "coder-1", BROADCAST).is_empty());
    }

    #[test]
    fn parse_list_splits_on_commas() {
        assert_eq!(parse_list("a, b,,c "), names(&["a", "b", "c"]));
        assert!(parse_list("").is_empty());
    }
}

//! Onboarding documents shown to an agent on register and cold start.

use std::fs;
use std::path::Path;

use minion_core::models::AgentClass;

const SEPARATOR: &str = "\n\n---\n\n";

/// `PROTOCOL.md` followed by `classes/<class>.md`, whichever exist.
///
/// Returns `None` when neither file is present. Unreadable files are skipped.
pub fn load(runtime_dir: &Path, class: AgentClass) -> Option<String> {
    let candidates = [
        runtime_dir.join("PROTOCOL.md"),
        runtime_dir
            .join("classes")
            .join(format!("{}.md", class.as_str())),
    ];

    let parts: Vec<String> = candidates
        .iter()
        .filter(|path| path.exists())
        .filter_map(|path| match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read onboarding doc");
                None
            }
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join(SEPARATOR))
}

/// The section appended to a tool response.
pub fn section(runtime_dir: &Path, class: AgentClass) -> String {
    match load(runtime_dir, class) {
        Some(docs) => format!(
            "\n\n# Onboarding\n\nRead and follow these instructions:\n\n{}",
            docs
        ),
        None => format!(
            "\n\nNo onboarding docs found in runtime dir. Check {}/PROTOCOL.md and {}/classes/{}.md",
            runtime_dir.display(),
            runtime_dir.display(),
            class.as_str()
        ),
    }
}

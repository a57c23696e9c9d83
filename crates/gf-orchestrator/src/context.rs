//! Optional project context used to enrich planning messages.

/// Describes the project a goal belongs to.
///
/// Both methods return `None` when nothing useful is known; the planner then
/// falls back to a fixed "unavailable" line.
pub trait ProjectContextProvider: Send + Sync {
    /// Short summary of detected frameworks and languages.
    fn summary(&self) -> Option<String>;

    /// Snapshot of key project files, at most `max_chars` characters.
    fn key_files_snapshot(&self, max_chars: usize) -> Option<String>;
}

/// Join summary and snapshot into the block placed in the planning message.
pub(crate) fn gather(
    provider: Option<&dyn ProjectContextProvider>,
    max_chars: usize,
) -> Option<String> {
    let provider = provider?;
    let mut sections = Vec::new();
    if let Some(summary) = provider.summary().filter(|s| !s.trim().is_empty()) {
        sections.push(summary.trim().to_string());
    }
    if let Some(snapshot) = provider
        .key_files_snapshot(max_chars)
        .filter(|s| !s.trim().is_empty())
    {
        let snapshot: String = snapshot.chars().take(max_chars).collect();
        sections.push(format!("Key files:\n{}", snapshot.trim_end()));
    }
    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

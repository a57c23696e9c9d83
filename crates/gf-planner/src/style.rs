//! Style-only prompt classification.
//!
//! A pure cosmetic request ("make the header background dark blue") does not
//! need a planning call: the orchestrator substitutes a fixed three-step plan.
//! The decision sits behind [`StyleChangeClassifier`] so a host can plug in a
//! model-backed classifier; [`KeywordStyleClassifier`] is the built-in one.

use std::sync::LazyLock;

use regex::Regex;

/// Decides whether a prompt only asks for a visual tweak.
pub trait StyleChangeClassifier: Send + Sync {
    fn is_style_only(&self, prompt: &str) -> bool;
}

static COLOR_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:colou?rs?|background|foreground|theme|palette|hue|shade|tint|dark\s+mode|light\s+mode|red|orange|yellow|green|blue|purple|violet|pink|black|white|gr[ae]y|teal|cyan|magenta|brown|navy|gold|silver)\b|#[0-9a-f]{3}(?:[0-9a-f]{3})?\b|\b(?:rgba?|hsla?)\s*\(",
    )
    .expect("valid regex")
});

static CHANGE_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:change|make|set|update|switch|turn|use|recolou?r|paint|swap|tweak)\b")
        .expect("valid regex")
});

static FUNCTIONAL_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:add|create|build|implement|fix|bugs?|api|endpoints?|database|backend|server|logic|validat\w*|fetch\w*|tests?|crash\w*|errors?)\b",
    )
    .expect("valid regex")
});

/// Keyword classifier: a change verb plus a color term, and nothing that
/// suggests functional work.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordStyleClassifier;

impl StyleChangeClassifier for KeywordStyleClassifier {
    fn is_style_only(&self, prompt: &str) -> bool {
        let prompt = prompt.trim();
        !prompt.is_empty()
            && COLOR_TERM.is_match(prompt)
            && CHANGE_VERB.is_match(prompt)
            && !FUNCTIONAL_TERM.is_match(prompt)
    }
}

/// Classifier that never short-circuits planning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStyleOnly;

impl StyleChangeClassifier for NeverStyleOnly {
    fn is_style_only(&self, _prompt: &str) -> bool {
        false
    }
}

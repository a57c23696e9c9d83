//! Prompt heuristics: acceptance criteria, clarifying questions, titles and
//! prompt classification.
//!
//! Everything here is a pure function of the prompt text so it can run before
//! (or instead of) any language-model call.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Asked when a prompt gives no way to tell when the work is finished.
pub const QUESTION_DEFINITION_OF_DONE: &str =
    "What should \"done\" look like? Please provide acceptance criteria.";

/// Asked when a bug report lacks expected/actual behavior.
pub const QUESTION_EXPECTED_VS_ACTUAL: &str =
    "What is the expected behavior, and what is currently happening?";

/// Titles are cut at a word boundary below this many characters.
pub const MAX_TITLE_CHARS: usize = 96;

static CRITERIA_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:acceptance\s+criteria|ac)\s*:\s*(.*)$").expect("valid regex")
});

static BULLET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").expect("valid regex"));

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[A-Za-z][A-Za-z0-9 _/()'-]{0,40}:(?:\s|$)").expect("valid regex")
});

static VAGUE_BUILD_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:please\s+)?(?:build|make|create)\s+(?:me\s+|us\s+)?(?:an?\s+|the\s+|some\s+|my\s+)?(?:new\s+|simple\s+|basic\s+|cool\s+|nice\s+)?(?:app|application|website|site|web\s?app|tool|thing|project|system|game|page|feature|dashboard|program|something)s?\s*[.!]?\s*$",
    )
    .expect("valid regex")
});

static BUG_REPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:fix(?:es|ed|ing)?|bugs?|broken|errors?|issues?|crash(?:es|ed|ing)?)\b")
        .expect("valid regex")
});

static EXPECTATION_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:expect(?:ed|ing|s)?|actual(?:ly)?|repro(?:duce|duction|duced)?|steps\s+to)\b")
        .expect("valid regex")
});

static VERIFY_TESTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:re-run|rerun|run|execute|verify|check)\b.*\b(?:tests?|test\s+suite|coverage|vitest)\b",
    )
    .expect("valid regex")
});

static DIRECT_TEST_INVOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:npm|pnpm|yarn|bun)\s+(?:run\s+)?test\b|\bnpx\s+vitest\b|\bvitest\s+run\b|\bcargo\s+test\b",
    )
    .expect("valid regex")
});

// Only a leading verb marks real work; "Run the tests to verify the fix" is still a test run.
static LEADING_AUTHORING_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:add|write|create|implement|build|fix|update|refactor|introduce)\b")
        .expect("valid regex")
});

static COMPOUND_CONJUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:and|with|also|including)\b").expect("valid regex"));

static MULTI_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+\S").expect("valid regex"));

const QUOTE_CHARS: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{AB}', '\u{BB}'];

// Checked in order; a longer phrase always precedes any phrase it starts with.
const FILLER_PREFIXES: &[&str] = &[
    "i would like you to",
    "i would like to",
    "i want you to",
    "i want to",
    "i need you to",
    "i need to",
    "we need to",
    "could you",
    "would you",
    "can you",
    "can we",
    "could we",
    "let's",
    "lets",
    "let us",
    "help me",
    "please",
    "kindly",
];

const TITLE_STOPWORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "in", "nor", "of", "on", "or", "per", "to", "via",
    "vs",
];

/// Metadata derived from a prompt before any model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptAnalysis {
    pub acceptance_criteria: Vec<String>,
    pub clarifying_questions: Vec<String>,
    pub style_only: bool,
}

impl PromptAnalysis {
    /// Run criteria extraction and question detection. `style_only` is left
    /// for the caller's [`StyleChangeClassifier`](crate::style::StyleChangeClassifier).
    pub fn from_prompt(prompt: &str) -> Self {
        let acceptance_criteria = extract_acceptance_criteria(prompt);
        let clarifying_questions = detect_clarifying_questions(prompt, &acceptance_criteria);
        Self {
            acceptance_criteria,
            clarifying_questions,
            style_only: false,
        }
    }
}

/// Collect the items of every `Acceptance Criteria:` / `AC:` section.
pub fn extract_acceptance_criteria(prompt: &str) -> Vec<String> {
    let mut criteria: Vec<String> = Vec::new();
    let mut in_section = false;

    for line in prompt.lines() {
        if let Some(caps) = CRITERIA_HEADER.captures(line) {
            in_section = true;
            if let Some(inline) = caps.get(1) {
                push_unique(&mut criteria, inline.as_str());
            }
            continue;
        }

        if !in_section {
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !criteria.is_empty() {
                in_section = false;
            }
            continue;
        }

        if let Some(caps) = BULLET_LINE.captures(line) {
            if let Some(item) = caps.get(1) {
                push_unique(&mut criteria, item.as_str());
            }
        } else if HEADER_LINE.is_match(line) {
            in_section = false;
        } else {
            push_unique(&mut criteria, trimmed);
        }
    }

    criteria
}

/// Questions to ask before planning. Empty whenever acceptance criteria exist.
pub fn detect_clarifying_questions(prompt: &str, acceptance_criteria: &[String]) -> Vec<String> {
    if !acceptance_criteria.is_empty() {
        return Vec::new();
    }

    let bug_like = BUG_REPORT.is_match(prompt);
    let mut questions = Vec::new();

    if is_underspecified(prompt) || bug_like {
        questions.push(QUESTION_DEFINITION_OF_DONE.to_string());
    }
    if bug_like && !EXPECTATION_LANGUAGE.is_match(prompt) {
        questions.push(QUESTION_EXPECTED_VS_ACTUAL.to_string());
    }

    questions
}

/// Too short to act on, or "build me an app" with nothing else.
pub fn is_underspecified(prompt: &str) -> bool {
    prompt.split_whitespace().count() <= 2 || VAGUE_BUILD_REQUEST.is_match(prompt)
}

/// Prompts that only ask to run tests or coverage. Test execution happens
/// automatically, so these never become plan steps.
pub fn is_programmatic_verification_step(prompt: &str) -> bool {
    let prompt = prompt.trim();
    if prompt.is_empty() || LEADING_AUTHORING_VERB.is_match(prompt) {
        return false;
    }
    VERIFY_TESTS.is_match(prompt) || DIRECT_TEST_INVOCATION.is_match(prompt)
}

/// Prompts that bundle several asks.
pub fn is_compound_prompt(prompt: &str) -> bool {
    let trimmed = prompt.trim();
    if COMPOUND_CONJUNCTION.is_match(trimmed) || trimmed.contains(&[',', ';', '&', '+'][..]) {
        return true;
    }
    let non_empty_lines = trimmed.lines().filter(|l| !l.trim().is_empty()).count();
    non_empty_lines > 1 || MULTI_SENTENCE.is_match(trimmed)
}

/// Lowercase, alphanumeric-only, single-spaced form used for comparisons.
pub fn normalize_for_comparison(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// One text contains the other and the shorter is at least 60% as long.
pub fn is_near_duplicate(a: &str, b: &str) -> bool {
    let a = normalize_for_comparison(a);
    let b = normalize_for_comparison(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if !longer.contains(shorter.as_str()) {
        return false;
    }
    shorter.len() as f64 / longer.len() as f64 >= 0.6
}

/// Derive a short title-cased label from free text.
///
/// Returns `fallback` when nothing is left after stripping quotes and filler.
pub fn derive_title(text: &str, fallback: &str) -> String {
    let Some(first_line) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return fallback.to_string();
    };

    let stripped = strip_filler(first_line).trim_end_matches(QUOTE_CHARS);
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return fallback.to_string();
    }

    let truncated = truncate_at_word(&collapsed, MAX_TITLE_CHARS);
    title_case(truncated)
}

fn strip_filler(line: &str) -> &str {
    let mut rest = line.trim_start_matches(QUOTE_CHARS).trim_start();
    loop {
        let lower = rest.to_lowercase();
        let prefix = FILLER_PREFIXES.iter().find(|prefix| {
            lower.starts_with(*prefix)
                && lower[prefix.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphanumeric())
        });
        let Some(prefix) = prefix else {
            return rest;
        };
        // Prefixes are ASCII; bail out if lowercasing shifted the offset.
        let Some(after) = rest.get(prefix.len()..) else {
            return rest;
        };
        rest = after
            .trim_start_matches(|c: char| c.is_whitespace() || ",:;.!-".contains(c))
            .trim_start_matches(QUOTE_CHARS);
    }
}

fn truncate_at_word(text: &str, max_chars: usize) -> &str {
    let Some((cut, next)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let head = &text[..cut];
    if next.is_whitespace() {
        return head.trim_end();
    }
    match head.rfind(' ') {
        Some(space) => head[..space].trim_end(),
        None => head,
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .enumerate()
        .map(|(index, word)| {
            let lower = word.to_lowercase();
            let stopword = TITLE_STOPWORDS.contains(&lower.as_str());
            if index > 0 && stopword {
                lower
            } else if !stopword && is_short_acronym(word) {
                word.to_string()
            } else {
                capitalize(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_short_acronym(word: &str) -> bool {
    word.chars().count() <= 5
        && word.chars().any(char::is_alphabetic)
        && !word.chars().any(char::is_lowercase)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn push_unique(items: &mut Vec<String>, candidate: &str) {
    let candidate = candidate.trim();
    if !candidate.is_empty() && !items.iter().any(|existing| existing == candidate) {
        items.push(candidate.to_string());
    }
}

/// Deduplicate while keeping first occurrences in order.
pub fn dedupe_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criteria_bullets_in_order_and_deduplicated() {
        let prompt = "Add a login form.\n\nAcceptance Criteria:\n- Email is validated\n* Password is masked\n• Errors shown inline\n1. Email is validated\n2) Submit disabled while loading\n\nUnrelated trailing text";
        assert_eq!(
            extract_acceptance_criteria(prompt),
            vec![
                "Email is validated",
                "Password is masked",
                "Errors shown inline",
                "Submit disabled while loading",
            ]
        );
    }

    #[test]
    fn criteria_capture_inline_value_and_stop_at_header() {
        let prompt = "ac: works offline\n- syncs on reconnect\nNotes: not a criterion\n- also not one";
        assert_eq!(
            extract_acceptance_criteria(prompt),
            vec!["works offline", "syncs on reconnect"]
        );
    }

    #[test]
    fn blank_line_before_first_item_does_not_end_section() {
        let prompt = "Acceptance criteria:\n\n- first\n- second\n\n- after blank";
        assert_eq!(extract_acceptance_criteria(prompt), vec!["first", "second"]);
    }

    #[test]
    fn no_header_means_no_criteria() {
        assert!(extract_acceptance_criteria("- just a bullet\n- another").is_empty());
    }

    #[test]
    fn bug_report_without_expectations_gets_both_questions() {
        let prompt = "Fix the login bug";
        let criteria = extract_acceptance_criteria(prompt);
        assert_eq!(
            detect_clarifying_questions(prompt, &criteria),
            vec![
                "What should \"done\" look like? Please provide acceptance criteria.".to_string(),
                "What is the expected behavior, and what is currently happening?".to_string(),
            ]
        );
    }

    #[test]
    fn bug_report_with_expectations_gets_one_question() {
        let prompt = "The checkout crashes; expected a receipt page, actually see a blank screen";
        assert_eq!(
            detect_clarifying_questions(prompt, &[]),
            vec![QUESTION_DEFINITION_OF_DONE.to_string()]
        );
    }

    #[test]
    fn underspecified_prompts_ask_for_done() {
        assert_eq!(
            detect_clarifying_questions("Dark mode", &[]),
            vec![QUESTION_DEFINITION_OF_DONE.to_string()]
        );
        assert_eq!(
            detect_clarifying_questions("Build me an app", &[]),
            vec![QUESTION_DEFINITION_OF_DONE.to_string()]
        );
        assert!(detect_clarifying_questions(
            "Add a settings page where users can change their display name",
            &[]
        )
        .is_empty());
    }

    #[test]
    fn criteria_suppress_questions() {
        let prompt = "Fix the login bug\nAcceptance criteria:\n- login succeeds with valid password";
        let analysis = PromptAnalysis::from_prompt(prompt);
        assert_eq!(analysis.acceptance_criteria.len(), 1);
        assert!(analysis.clarifying_questions.is_empty());
    }

    #[test]
    fn derive_title_strips_prefix_and_keeps_acronyms() {
        assert_eq!(
            derive_title("please fix the LOGIN flow for real", "Goal"),
            "Fix The LOGIN Flow For Real"
        );
    }

    #[test]
    fn derive_title_lowercases_stopwords_after_first_word() {
        assert_eq!(
            derive_title("Can you add a toggle to the settings page", "Goal"),
            "Add a Toggle to The Settings Page"
        );
        assert_eq!(derive_title("a tour of the API", "Goal"), "A Tour of The API");
    }

    #[test]
    fn derive_title_handles_quotes_lines_and_fallback() {
        assert_eq!(
            derive_title("\n  \"Let's   build   a CLI\"\nsecond line", "Goal"),
            "Build a CLI"
        );
        assert_eq!(derive_title("'Add dark mode'", "Goal"), "Add Dark Mode");
        assert_eq!(derive_title("   ", "Goal"), "Goal");
        assert_eq!(derive_title("please", "Untitled"), "Untitled");
        assert_eq!(derive_title("LONGACRONYM support", "Goal"), "Longacronym Support");
    }

    #[test]
    fn derive_title_truncates_at_word_boundary() {
        let text = "word ".repeat(40);
        let title = derive_title(&text, "Goal");
        assert!(title.chars().count() <= MAX_TITLE_CHARS);
        assert!(title.ends_with("Word"));
    }

    #[test]
    fn verification_steps_are_detected() {
        assert!(is_programmatic_verification_step("Run the unit tests"));
        assert!(is_programmatic_verification_step("Re-run the test suite"));
        assert!(is_programmatic_verification_step("Check test coverage"));
        assert!(is_programmatic_verification_step("npm test"));
        assert!(is_programmatic_verification_step("Execute `pnpm run test` again"));
        assert!(!is_programmatic_verification_step("Add a login form"));
        assert!(!is_programmatic_verification_step("Write tests for the login form"));
        assert!(!is_programmatic_verification_step("Add a regression test for the parser"));
        assert!(is_programmatic_verification_step("Run the tests to verify the fix"));
        assert!(is_programmatic_verification_step("Re-run the test suite after the update"));
        assert!(is_programmatic_verification_step(
            "Run the unit tests again to confirm the build is green"
        ));
        assert!(!is_programmatic_verification_step(""));
    }

    #[test]
    fn compound_prompts() {
        assert!(is_compound_prompt("Add a login page and a signup page"));
        assert!(is_compound_prompt("Add a dashboard with charts"));
        assert!(is_compound_prompt("Add search, filters"));
        assert!(is_compound_prompt("Add search. Then add filters."));
        assert!(!is_compound_prompt("Add a login page"));
    }

    #[test]
    fn near_duplicates() {
        assert!(is_near_duplicate("Add a login form", "add a login form!"));
        assert!(is_near_duplicate("Add the login form now", "Add the login form"));
        assert!(!is_near_duplicate("Add login", "Add login with OAuth, SSO and magic links"));
        assert!(!is_near_duplicate("", "anything"));
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let items = vec!["b".to_string(), "a".into(), " b ".into(), "".into()];
        assert_eq!(dedupe_preserving_order(items), vec!["b", "a"]);
    }
}

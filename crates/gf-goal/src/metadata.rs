// metadata.rs: Typed goal metadata and its merge rules.
//
// Well-known keys are named fields; anything else a caller supplies lives in
// `extra`, flattened into the same JSON object so stored records read as one
// open map.
//
// Merge rules:
//   - acceptanceCriteria / clarifyingQuestions: union, deduplicated,
//     existing entries first
//   - styleOnly and extra keys: the patch wins
//   - suppressClarifyingQuestions, testFailure or uncoveredLines in a patch
//     empties clarifyingQuestions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key a caller sets to force the clarifying-question list to empty.
pub const SUPPRESS_QUESTIONS_KEY: &str = "suppressClarifyingQuestions";
/// Set on goals created to retry a failing test run.
pub const TEST_FAILURE_KEY: &str = "testFailure";
/// Set on goals created to cover lines reported as uncovered.
pub const UNCOVERED_LINES_KEY: &str = "uncoveredLines";

/// Metadata stored on a Goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalMetadata {
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    #[serde(default)]
    pub clarifying_questions: Vec<String>,

    #[serde(default)]
    pub style_only: bool,

    /// Caller-defined keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A partial update to [`GoalMetadata`].
///
/// Deserializes from the same camelCase shape, so a caller can hand over a
/// plain JSON object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clarifying_questions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_only: Option<bool>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suppress_clarifying_questions: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataPatch {
    /// Patch that only sets caller-defined keys.
    pub fn with_extra(key: impl Into<String>, value: Value) -> Self {
        let mut patch = Self::default();
        patch.extra.insert(key.into(), value);
        patch
    }

    /// Patch that suppresses clarifying questions.
    pub fn suppressing_questions() -> Self {
        Self {
            suppress_clarifying_questions: true,
            ..Self::default()
        }
    }

    /// Whether applying this patch must leave no clarifying questions.
    pub fn suppresses_questions(&self) -> bool {
        self.suppress_clarifying_questions
            || self.extra.get(SUPPRESS_QUESTIONS_KEY).is_some_and(is_truthy)
            || self.extra.get(TEST_FAILURE_KEY).is_some_and(is_truthy)
            || self.extra.get(UNCOVERED_LINES_KEY).is_some_and(is_truthy)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl GoalMetadata {
    /// Merge a patch into this metadata in place.
    pub fn merge(&mut self, patch: &MetadataPatch) {
        union_into(&mut self.acceptance_criteria, &patch.acceptance_criteria);
        union_into(&mut self.clarifying_questions, &patch.clarifying_questions);
        if let Some(style_only) = patch.style_only {
            self.style_only = style_only;
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
        if patch.suppress_clarifying_questions {
            self.extra
                .insert(SUPPRESS_QUESTIONS_KEY.to_string(), Value::Bool(true));
        }
        if patch.suppresses_questions() {
            self.clarifying_questions.clear();
        }
    }

    /// Owned variant of [`GoalMetadata::merge`].
    pub fn merged(mut self, patch: &MetadataPatch) -> Self {
        self.merge(patch);
        self
    }
}

/// Append items from `incoming` that are not already present, keeping order.
pub fn union_into(target: &mut Vec<String>, incoming: &[String]) {
    for item in incoming {
        let item = item.trim();
        if item.is_empty() || target.iter().any(|existing| existing == item) {
            continue;
        }
        target.push(item.to_string());
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

//! Interpret planning and clarifying-question replies from the model.

use serde_json::Value;

use crate::error::PlanError;
use crate::heuristics::dedupe_preserving_order;
use crate::recover::recover_json;

/// Questions requested from the model are capped at this many.
pub const MAX_MODEL_QUESTIONS: usize = 3;

/// The usable parts of a planning reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReply {
    pub parent_title: Option<String>,
    pub questions: Vec<String>,
    /// Raw, not yet normalized `childGoals` entries.
    pub child_goals: Vec<Value>,
}

/// Recover `{parentTitle, questions, childGoals}` from raw model text.
pub fn parse_plan_reply(raw: &str) -> Result<PlanReply, PlanError> {
    let value = recover_json(Some(raw)).ok_or(PlanError::NotJson)?;

    let child_goals = value
        .get("childGoals")
        .and_then(Value::as_array)
        .ok_or(PlanError::MissingChildGoals)?;
    if child_goals.is_empty() {
        return Err(PlanError::EmptyChildGoals);
    }

    let parent_title = value
        .get("parentTitle")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(PlanReply {
        parent_title,
        questions: string_list(value.get("questions")),
        child_goals: child_goals.clone(),
    })
}

/// Recover clarifying questions from a reply: a `{"questions": [...]}`
/// object, a bare array, or plain lines ending in `?`.
pub fn parse_questions_reply(raw: &str) -> Vec<String> {
    let questions = match recover_json(Some(raw)) {
        Some(Value::Array(items)) => string_list(Some(&Value::Array(items))),
        Some(value) => string_list(value.get("questions")),
        None => dedupe_preserving_order(
            raw.lines()
                .map(|line| {
                    line.trim()
                        .trim_start_matches(|c: char| "-*•".contains(c) || c.is_ascii_digit())
                        .trim_start_matches(&['.', ')'][..])
                        .trim()
                        .to_string()
                })
                .filter(|line| line.ends_with('?')),
        ),
    };
    questions.into_iter().take(MAX_MODEL_QUESTIONS).collect()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    dedupe_preserving_order(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_reply_is_parsed() {
        let raw = r#"Here is the plan:
```json
{"parentTitle": " Auth ", "questions": ["SSO?", "SSO?", 3], "childGoals": [{"title": "Login", "prompt": "Add login"}]}
```"#;
        let reply = parse_plan_reply(raw).unwrap();
        assert_eq!(reply.parent_title.as_deref(), Some("Auth"));
        assert_eq!(reply.questions, vec!["SSO?"]);
        assert_eq!(reply.child_goals, vec![json!({"title": "Login", "prompt": "Add login"})]);
    }

    #[test]
    fn failures_are_distinguished() {
        assert_eq!(parse_plan_reply("I cannot help"), Err(PlanError::NotJson));
        assert_eq!(
            parse_plan_reply(r#"{"parentTitle": "x"}"#),
            Err(PlanError::MissingChildGoals)
        );
        assert_eq!(
            parse_plan_reply(r#"{"childGoals": "none"}"#),
            Err(PlanError::MissingChildGoals)
        );
        assert_eq!(
            parse_plan_reply(r#"{"childGoals": []}"#),
            Err(PlanError::EmptyChildGoals)
        );
    }

    #[test]
    fn error_messages_name_the_problem() {
        assert_eq!(PlanError::NotJson.to_string(), "language model reply is not valid JSON");
        assert!(PlanError::MissingChildGoals.to_string().contains("missing childGoals"));
        assert!(PlanError::EmptyChildGoals.to_string().contains("empty childGoals"));
    }

    #[test]
    fn questions_from_object_array_or_lines() {
        assert_eq!(
            parse_questions_reply(r#"{"questions": ["Which pages?", "Mobile?"]}"#),
            vec!["Which pages?", "Mobile?"]
        );
        assert_eq!(parse_questions_reply(r#"["One?"]"#), vec!["One?"]);
        assert_eq!(
            parse_questions_reply("Sure.\n1. Which browsers?\n- Any deadline?\nThanks"),
            vec!["Which browsers?", "Any deadline?"]
        );
        assert_eq!(
            parse_questions_reply(r#"{"questions": ["a?", "b?", "c?", "d?"]}"#).len(),
            MAX_MODEL_QUESTIONS
        );
    }
}

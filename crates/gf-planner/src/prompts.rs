// ═══════════════════════════════════════════════════════════════════════════════
// PLANNING PROMPTS
// ═══════════════════════════════════════════════════════════════════════════════

use crate::tree::PlanNode;

/// Used in place of project context when none could be gathered.
pub const CONTEXT_UNAVAILABLE: &str = "Project context is unavailable.";

/// Shared output contract for planning replies.
const PLAN_OUTPUT_RULES: &str = r#"OUTPUT (JSON object only, no prose):
{
  "parentTitle": "short title for the whole request",
  "questions": ["clarifying question, only if truly blocking"],
  "childGoals": [
    {"title": "short title", "prompt": "one concrete, self-contained instruction", "children": []}
  ]
}"#;

/// Planning rules shared by the first request and the stricter retry.
const PLAN_RULES: &str = r#"RULES:
- Each child goal is a concrete development step a coding agent can finish on its own.
- Nest children only when a step clearly splits into smaller steps.
- Do NOT add steps that only run tests, re-run tests or check coverage; tests run automatically.
- Do NOT repeat the user's request as a single step."#;

pub const PLANNING_SYSTEM: &str = r#"You are a senior engineer who turns a change request into a tree of development goals.
Respond with a single JSON object that follows the output contract exactly."#;

pub const QUESTIONS_SYSTEM: &str = r#"You help clarify software change requests before work starts.
Ask at most 3 short questions whose answers would change how the work is done.
Respond with JSON only: {"questions": ["..."]}. Use an empty list when nothing is unclear."#;

/// User message for the first planning call.
pub fn planning_user_prompt(request: &str, project_context: Option<&str>) -> String {
    let context = project_context
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(CONTEXT_UNAVAILABLE);
    format!(
        "PROJECT CONTEXT:\n{context}\n\nREQUEST:\n{request}\n\n{rules}\n\n{output}",
        request = request.trim(),
        rules = PLAN_RULES,
        output = PLAN_OUTPUT_RULES,
    )
}

/// User message for the stricter retry after a low-information plan.
pub fn strict_retry_user_prompt(
    request: &str,
    project_context: Option<&str>,
    previous: &[PlanNode],
) -> String {
    let previous_steps = if previous.is_empty() {
        "(none)".to_string()
    } else {
        previous
            .iter()
            .map(|node| format!("- {}", node.prompt))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "{base}\n\nYOUR PREVIOUS PLAN WAS TOO VAGUE:\n{previous_steps}\n\nReturn between 3 and 7 concrete childGoals that together complete the request. Each must be narrower than the request itself.",
        base = planning_user_prompt(request, project_context),
    )
}

/// User message asking for clarifying questions.
pub fn questions_user_prompt(request: &str) -> String {
    format!("REQUEST:\n{}", request.trim())
}

#[cfg(test)]
mod prompt_tests {
    use super::*;

    #[test]
    fn planning_prompt_uses_context_or_placeholder() {
        let prompt = planning_user_prompt("Add login", Some("Frontend: React (TypeScript)"));
        assert!(prompt.contains("Frontend: React (TypeScript)"));
        assert!(prompt.contains("childGoals"));

        let prompt = planning_user_prompt("Add login", None);
        assert!(prompt.contains(CONTEXT_UNAVAILABLE));
        let prompt = planning_user_prompt("Add login", Some("   "));
        assert!(prompt.contains(CONTEXT_UNAVAILABLE));
    }

    #[test]
    fn planning_rules_forbid_test_only_steps() {
        assert!(
            PLAN_RULES.contains("only run tests"),
            "PLAN_RULES must keep test execution out of plans"
        );
    }

    #[test]
    fn retry_prompt_asks_for_three_to_seven_children() {
        let previous = vec![PlanNode::leaf("Add login and signup", "Add Login")];
        let prompt = strict_retry_user_prompt("Add login and signup", None, &previous);
        assert!(prompt.contains("between 3 and 7"));
        assert!(prompt.contains("- Add login and signup"));
    }
}

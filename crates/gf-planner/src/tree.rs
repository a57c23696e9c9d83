//! Goal tree normalization.
//!
//! Turns the loosely shaped `childGoals` list of a planning reply into a
//! bounded, deduplicated tree of [`PlanNode`]s. Limits truncate instead of
//! failing, so an over-eager model answer degrades to a smaller plan.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::heuristics::{
    derive_title, is_compound_prompt, is_near_duplicate, is_programmatic_verification_step,
};

pub const DEFAULT_MAX_DEPTH: usize = 4;
pub const DEFAULT_MAX_NODES: usize = 40;

/// A node of a plan between reply recovery and goal persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    pub prompt: String,
    pub title: String,
    #[serde(default)]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn leaf(prompt: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            title: title.into(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + count_nodes(&self.children)
    }

    /// Number of levels in this subtree, including `self`.
    pub fn depth(&self) -> usize {
        1 + tree_depth(&self.children)
    }
}

/// Total nodes across a forest.
pub fn count_nodes(nodes: &[PlanNode]) -> usize {
    nodes.iter().map(PlanNode::node_count).sum()
}

/// Deepest level across a forest (0 for an empty forest).
pub fn tree_depth(nodes: &[PlanNode]) -> usize {
    nodes.iter().map(PlanNode::depth).max().unwrap_or(0)
}

/// Serialize a forest back into raw entries (for re-normalizing or prompts).
pub fn to_entries(nodes: &[PlanNode]) -> Vec<Value> {
    nodes
        .iter()
        .map(|node| {
            serde_json::json!({
                "prompt": node.prompt,
                "title": node.title,
                "children": to_entries(&node.children),
            })
        })
        .collect()
}

/// Shared limits and counters threaded through the recursion.
///
/// A slot is reserved before an entry's children are visited and released if
/// the entry is not committed, so committed + reserved never exceeds
/// `max_nodes`.
#[derive(Debug, Clone)]
pub struct NormalizeBudget {
    max_depth: usize,
    max_nodes: usize,
    used: usize,
}

impl NormalizeBudget {
    pub fn new(max_depth: usize, max_nodes: usize) -> Self {
        Self {
            max_depth,
            max_nodes,
            used: 0,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    fn exhausted(&self) -> bool {
        self.used >= self.max_nodes
    }

    fn reserve(&mut self) {
        self.used += 1;
    }

    fn release(&mut self, count: usize) {
        self.used = self.used.saturating_sub(count);
    }
}

/// Normalize raw plan entries into a bounded tree.
///
/// Entries are strings or objects with `prompt` (or just `title`), optional
/// `title`, and children under `children` or `childGoals`.
pub fn normalize_tree(entries: &[Value], max_depth: usize, max_nodes: usize) -> Vec<PlanNode> {
    let mut budget = NormalizeBudget::new(max_depth, max_nodes);
    normalize_with_budget(entries, &mut budget)
}

/// [`normalize_tree`] with a caller-owned budget.
pub fn normalize_with_budget(entries: &[Value], budget: &mut NormalizeBudget) -> Vec<PlanNode> {
    normalize_level(entries, 1, budget)
}

struct RawEntry<'a> {
    prompt: String,
    title: Option<String>,
    children: &'a [Value],
}

fn read_entry(entry: &Value) -> Option<RawEntry<'_>> {
    match entry {
        Value::String(prompt) => Some(RawEntry {
            prompt: prompt.trim().to_string(),
            title: None,
            children: &[],
        }),
        Value::Object(map) => {
            let text = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let title = text("title");
            let prompt = text("prompt").or_else(|| title.clone()).unwrap_or_default();
            let children = map
                .get("children")
                .and_then(Value::as_array)
                .or_else(|| map.get("childGoals").and_then(Value::as_array))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            Some(RawEntry {
                prompt,
                title,
                children,
            })
        }
        _ => None,
    }
}

fn normalize_level(entries: &[Value], depth: usize, budget: &mut NormalizeBudget) -> Vec<PlanNode> {
    let mut nodes = Vec::new();
    if depth > budget.max_depth {
        return nodes;
    }
    let mut seen: HashSet<String> = HashSet::new();

    for entry in entries {
        if budget.exhausted() {
            break;
        }
        let Some(raw) = read_entry(entry) else {
            continue;
        };

        budget.reserve();
        let children = normalize_level(raw.children, depth + 1, budget);

        let keep = !raw.prompt.is_empty()
            && !is_programmatic_verification_step(&raw.prompt)
            && !seen.contains(&raw.prompt);

        if keep {
            seen.insert(raw.prompt.clone());
            let title = raw
                .title
                .unwrap_or_else(|| derive_title(&raw.prompt, &raw.prompt));
            nodes.push(PlanNode {
                prompt: raw.prompt,
                title,
                children,
            });
        } else {
            tracing::debug!(prompt = %raw.prompt, "dropping plan entry, promoting its children");
            budget.release(1);
            for child in children {
                splice(&mut nodes, &mut seen, child, budget);
            }
        }
    }

    nodes
}

/// Promote a node into a sibling list; a duplicate is dropped and its own
/// children are promoted in its place.
fn splice(
    nodes: &mut Vec<PlanNode>,
    seen: &mut HashSet<String>,
    node: PlanNode,
    budget: &mut NormalizeBudget,
) {
    if seen.insert(node.prompt.clone()) {
        nodes.push(node);
        return;
    }
    budget.release(1);
    for child in node.children {
        splice(nodes, seen, child, budget);
    }
}

/// A single childless step that restates the request, or that fails to split
/// a compound request.
pub fn is_low_information_plan(plan: &[PlanNode], original_prompt: &str) -> bool {
    match plan {
        [only] if only.children.is_empty() => {
            is_near_duplicate(&only.prompt, original_prompt) || is_compound_prompt(original_prompt)
        }
        _ => false,
    }
}

/// Last-resort plan when the model cannot decompose the request.
pub fn heuristic_fallback_plan(prompt: &str) -> Vec<PlanNode> {
    let request = prompt.trim();
    [
        (
            format!("Identify the components, data and files needed for: {request}"),
            "Identify Components and Data",
        ),
        (
            format!("Build the user interface for: {request}"),
            "Build the User Interface",
        ),
        (
            format!("Wire the new pieces into the app and verify the behavior for: {request}"),
            "Wire In and Verify",
        ),
    ]
    .into_iter()
    .map(|(prompt, title)| PlanNode::leaf(prompt, title))
    .collect()
}

/// Fixed plan for pure style changes.
pub fn style_change_plan(prompt: &str) -> Vec<PlanNode> {
    let request = prompt.trim();
    vec![
        PlanNode::leaf(
            "Create a working branch for this style change",
            "Create Working Branch",
        ),
        PlanNode::leaf(
            format!("Apply the color change: {request}"),
            derive_title(request, "Apply Color Change"),
        ),
        PlanNode::leaf(
            "Stage the changed files for review",
            "Stage Changes for Review",
        ),
    ]
}

//! # gf-planner
//!
//! Turns free-form language-model output and raw user prompts into bounded
//! plan trees for goalforge.
//!
//! ## Key components
//!
//! - [`recover_json`]: JSON recovery from fenced / prose-wrapped replies
//! - [`heuristics`]: acceptance criteria, clarifying questions, titles,
//!   verification-step and compound-prompt detection
//! - [`StyleChangeClassifier`]: pure style-change detection
//! - [`normalize_tree`]: bounded, deduplicated [`PlanNode`] trees
//! - [`prompts`] / [`reply`]: planning message text and reply parsing

pub mod error;
pub mod heuristics;
pub mod prompts;
pub mod recover;
pub mod reply;
pub mod style;
pub mod tree;

pub use error::PlanError;
pub use heuristics::{derive_title, PromptAnalysis};
pub use recover::recover_json;
pub use reply::{parse_plan_reply, parse_questions_reply, PlanReply};
pub use style::{KeywordStyleClassifier, NeverStyleOnly, StyleChangeClassifier};
pub use tree::{
    heuristic_fallback_plan, is_low_information_plan, normalize_tree, style_change_plan,
    NormalizeBudget, PlanNode, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES,
};

// orchestrator.rs: goal creation, planning and lifecycle writes.
//
// The orchestrator holds no goal state. Every operation reads from and writes
// to the GoalStore, which is the serialization point for concurrent callers:
// contradictory advance_goal_phase / advance_goal_state calls on one goal
// resolve as last write wins.
//
// Planning flow (plan_goal):
//   existing children of goal_id?  -> return them unchanged (not on replan)
//   style-only prompt?             -> fixed three-step plan, no model call
//   otherwise                      -> one planning call, recover + normalize,
//                                     one stricter retry on a vague plan,
//                                     heuristic plan if the retry fails too
//   then: optional model questions, cancellation check, re-check for
//   children, persist the tree.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use gf_goal::metadata::union_into;
use gf_goal::{
    validate_phase_transition, validate_state_transition, EventDispatcher, Goal, GoalEvent,
    GoalMetadata, GoalStore, GoalTask, GoalTaskKind, MetadataPatch, NewGoal, NewGoalTask,
    PlanSource,
};
use gf_planner::heuristics::dedupe_preserving_order;
use gf_planner::prompts::{
    planning_user_prompt, questions_user_prompt, strict_retry_user_prompt, PLANNING_SYSTEM,
    QUESTIONS_SYSTEM,
};
use gf_planner::{
    derive_title, heuristic_fallback_plan, is_low_information_plan, normalize_tree,
    parse_plan_reply, parse_questions_reply, style_change_plan, KeywordStyleClassifier,
    PlanNode, PromptAnalysis, StyleChangeClassifier,
};

use crate::branch::BranchProvider;
use crate::cancel::CancellationToken;
use crate::config::PlannerConfig;
use crate::context::{self, ProjectContextProvider};
use crate::error::{OrchestratorError, Result};
use crate::llm::{ChatMessage, GenerationOptions, LanguageModelClient};

/// Metadata key holding answers given to clarifying questions.
pub const CLARIFICATION_ANSWERS_KEY: &str = "clarificationAnswers";

const FALLBACK_TITLE: &str = "Goal";

/// A freshly created goal and its seed task.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedGoal {
    pub goal: Goal,
    pub tasks: Vec<GoalTask>,
}

/// A persisted goal with its persisted children, oldest first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersistedGoalNode {
    pub goal: Goal,
    pub children: Vec<PersistedGoalNode>,
}

impl PersistedGoalNode {
    /// This goal plus all descendants.
    pub fn node_count(&self) -> usize {
        1 + count_persisted(&self.children)
    }
}

fn count_persisted(nodes: &[PersistedGoalNode]) -> usize {
    nodes.iter().map(PersistedGoalNode::node_count).sum()
}

/// Result of a planning call.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub parent: Goal,
    pub children: Vec<PersistedGoalNode>,
    /// Open clarifying questions for the parent goal.
    pub questions: Vec<String>,
}

/// Everything `plan_goal` accepts.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub project_id: String,
    pub prompt: String,
    /// Plan below this existing goal instead of creating a new root.
    pub goal_id: Option<Uuid>,
    /// Metadata patches keyed by node prompt, applied when that node is
    /// persisted.
    pub overrides: HashMap<String, MetadataPatch>,
    /// Extra guidance appended to the planning message only.
    pub clarification: Option<String>,
    pub cancel: Option<CancellationToken>,
    /// Plan again even though the goal still has children.
    replace_existing: bool,
}

impl PlanRequest {
    pub fn new(project_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn for_goal(mut self, goal_id: Uuid) -> Self {
        self.goal_id = Some(goal_id);
        self
    }

    pub fn with_override(mut self, prompt: impl Into<String>, patch: MetadataPatch) -> Self {
        self.overrides.insert(prompt.into().trim().to_string(), patch);
        self
    }

    pub fn with_clarification(mut self, clarification: impl Into<String>) -> Self {
        self.clarification = Some(clarification.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn override_for(&self, prompt: &str) -> Option<&MetadataPatch> {
        self.overrides.get(prompt.trim())
    }
}

/// A plan ready to persist.
struct DraftPlan {
    nodes: Vec<PlanNode>,
    parent_title: Option<String>,
    questions: Vec<String>,
    source: PlanSource,
}

/// Coordinates planning and lifecycle writes over the collaborator traits.
pub struct GoalOrchestrator {
    store: Arc<dyn GoalStore>,
    model: Arc<dyn LanguageModelClient>,
    context: Option<Arc<dyn ProjectContextProvider>>,
    branches: Option<Arc<dyn BranchProvider>>,
    style: Box<dyn StyleChangeClassifier>,
    config: PlannerConfig,
    events: EventDispatcher,
}

impl GoalOrchestrator {
    pub fn new(store: Arc<dyn GoalStore>, model: Arc<dyn LanguageModelClient>) -> Self {
        Self {
            store,
            model,
            context: None,
            branches: None,
            style: Box::new(KeywordStyleClassifier),
            config: PlannerConfig::default(),
            events: EventDispatcher::new(),
        }
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn ProjectContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn with_branch_provider(mut self, provider: Arc<dyn BranchProvider>) -> Self {
        self.branches = Some(provider);
        self
    }

    pub fn with_style_classifier(mut self, classifier: Box<dyn StyleChangeClassifier>) -> Self {
        self.style = classifier;
        self
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn GoalStore> {
        &self.store
    }

    // ── Creation ────────────────────────────────────────────────

    /// Create a root goal with its seed task.
    pub fn create_goal_from_prompt(
        &self,
        project_id: &str,
        prompt: &str,
        title: Option<&str>,
    ) -> Result<CreatedGoal> {
        let (project_id, prompt) = validate_request(project_id, prompt)?;
        self.create_goal_record(project_id, None, prompt, title, &[], None)
    }

    /// Create a goal below an existing parent of the same project.
    pub fn create_child_goal(
        &self,
        project_id: &str,
        parent_goal_id: Uuid,
        prompt: &str,
        title: Option<&str>,
    ) -> Result<Goal> {
        let (project_id, prompt) = validate_request(project_id, prompt)?;
        let parent = self
            .store
            .get_goal(parent_goal_id)?
            .ok_or(OrchestratorError::ParentNotFound(parent_goal_id))?;
        if parent.project_id != project_id {
            return Err(OrchestratorError::ProjectMismatch);
        }
        let created = self.create_goal_record(project_id, Some(&parent), prompt, title, &[], None)?;
        Ok(created.goal)
    }

    /// Shared creation path: heuristics, metadata merge, persist, seed task.
    fn create_goal_record(
        &self,
        project_id: &str,
        parent: Option<&Goal>,
        prompt: &str,
        title: Option<&str>,
        extra_questions: &[String],
        patch: Option<&MetadataPatch>,
    ) -> Result<CreatedGoal> {
        let analysis = PromptAnalysis::from_prompt(prompt);
        let mut metadata = GoalMetadata {
            acceptance_criteria: analysis.acceptance_criteria,
            clarifying_questions: analysis.clarifying_questions,
            style_only: self.style.is_style_only(prompt),
            ..GoalMetadata::default()
        };
        union_into(&mut metadata.clarifying_questions, extra_questions);
        if let Some(patch) = patch {
            metadata.merge(patch);
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| derive_title(prompt, FALLBACK_TITLE));

        let mut new_goal = NewGoal::new(project_id, prompt, title).with_metadata(metadata);
        if let Some(parent) = parent {
            new_goal = new_goal
                .with_parent(parent.id)
                .with_branch(parent.branch_name.clone());
        }

        let goal = self.store.create_goal(new_goal)?;
        tracing::info!(
            goal_id = %goal.id,
            parent_goal_id = ?goal.parent_goal_id,
            "created goal \"{}\"",
            goal.title
        );
        self.events.dispatch(&GoalEvent::goal_created(&goal));

        let seed = if goal.metadata.clarifying_questions.is_empty() {
            NewGoalTask::new(goal.id, GoalTaskKind::Analysis, "Analyze the request").with_payload(
                json!({
                    "prompt": goal.prompt,
                    "acceptanceCriteria": goal.metadata.acceptance_criteria,
                }),
            )
        } else {
            NewGoalTask::new(goal.id, GoalTaskKind::Clarification, "Answer clarifying questions")
                .with_payload(json!({ "questions": goal.metadata.clarifying_questions }))
        };
        let task = self.store.create_goal_task(seed)?;

        Ok(CreatedGoal {
            goal,
            tasks: vec![task],
        })
    }

    // ── Planning ────────────────────────────────────────────────

    /// Plan a prompt into a persisted goal tree.
    pub fn plan_goal_from_prompt(
        &self,
        project_id: &str,
        prompt: &str,
        goal_id: Option<Uuid>,
    ) -> Result<PlanOutcome> {
        let mut request = PlanRequest::new(project_id, prompt);
        request.goal_id = goal_id;
        self.plan_goal(request)
    }

    /// Plan with per-prompt overrides, a clarification and cancellation.
    pub fn plan_goal(&self, request: PlanRequest) -> Result<PlanOutcome> {
        let (project_id, prompt) = validate_request(&request.project_id, &request.prompt)?;

        let existing_parent = match request.goal_id {
            Some(goal_id) => {
                let goal = self
                    .store
                    .get_goal(goal_id)?
                    .ok_or(OrchestratorError::GoalNotFound(goal_id))?;
                if goal.project_id != project_id {
                    return Err(OrchestratorError::ProjectMismatch);
                }
                if !request.replace_existing {
                    if let Some(outcome) = self.existing_plan(&goal)? {
                        tracing::info!(goal_id = %goal.id, "goal already planned, reusing children");
                        return Ok(outcome);
                    }
                }
                Some(goal)
            }
            None => None,
        };

        let mut draft = if self.style.is_style_only(prompt) {
            tracing::debug!("style-only prompt, using fixed plan");
            DraftPlan {
                nodes: style_change_plan(prompt),
                parent_title: None,
                questions: Vec::new(),
                source: PlanSource::StyleOnly,
            }
        } else {
            self.draft_plan_with_model(prompt, request.clarification.as_deref())?
        };

        let suppressed = request
            .override_for(prompt)
            .is_some_and(MetadataPatch::suppresses_questions);
        let heuristic_questions = PromptAnalysis::from_prompt(prompt).clarifying_questions;
        if draft.source != PlanSource::StyleOnly
            && draft.questions.is_empty()
            && heuristic_questions.is_empty()
            && !suppressed
            && self.config.wants_model_questions()
        {
            draft.questions = self.request_model_questions(prompt);
        }

        if request.is_cancelled() {
            tracing::info!("planning cancelled before persistence");
            return Err(OrchestratorError::Cancelled);
        }

        // Another caller may have planned this goal while the model was busy.
        if let Some(goal) = existing_parent.as_ref().filter(|_| !request.replace_existing) {
            if let Some(outcome) = self.existing_plan(goal)? {
                tracing::info!(goal_id = %goal.id, "children appeared while planning");
                return Ok(outcome);
            }
        }

        let (parent, questions) = match existing_parent {
            Some(goal) => {
                let mut metadata = goal.metadata.clone();
                union_into(&mut metadata.clarifying_questions, &heuristic_questions);
                union_into(&mut metadata.clarifying_questions, &draft.questions);
                if let Some(patch) = request.override_for(prompt) {
                    metadata.merge(patch);
                }
                let goal = if metadata == goal.metadata {
                    goal
                } else {
                    self.store.update_goal_status(goal.id, goal.status, metadata)?
                };
                let questions = goal.metadata.clarifying_questions.clone();
                (goal, questions)
            }
            None => {
                let created = self.create_goal_record(
                    project_id,
                    None,
                    prompt,
                    draft.parent_title.as_deref(),
                    &draft.questions,
                    request.override_for(prompt),
                )?;
                let questions = created.goal.metadata.clarifying_questions.clone();
                (created.goal, questions)
            }
        };

        let children = self.persist_nodes(&parent, &draft.nodes, &request)?;
        let goal_count = count_persisted(&children);
        tracing::info!(
            parent_goal_id = %parent.id,
            goal_count,
            source = ?draft.source,
            "persisted plan"
        );
        self.events
            .dispatch(&GoalEvent::plan_persisted(parent.id, goal_count, draft.source));

        Ok(PlanOutcome {
            parent,
            children,
            questions,
        })
    }

    fn draft_plan_with_model(
        &self,
        prompt: &str,
        clarification: Option<&str>,
    ) -> Result<DraftPlan> {
        let planning_prompt = match clarification.map(str::trim).filter(|c| !c.is_empty()) {
            Some(answer) => format!("{prompt}\n\nClarification from the user:\n{answer}"),
            None => prompt.to_string(),
        };
        let project_context =
            context::gather(self.context.as_deref(), self.config.planning.context_max_chars);

        let messages = [
            ChatMessage::system(PLANNING_SYSTEM),
            ChatMessage::user(planning_user_prompt(
                &planning_prompt,
                project_context.as_deref(),
            )),
        ];
        let options = GenerationOptions::with_temperature(self.config.planning.temperature)
            .tag("purpose", "plan");
        let raw = self.model.generate_response(&messages, &options)?;
        let reply = parse_plan_reply(&raw)?;

        let nodes = self.normalize(&reply.child_goals);
        let mut draft = DraftPlan {
            nodes,
            parent_title: reply.parent_title,
            questions: reply.questions,
            source: PlanSource::Model,
        };

        if draft.nodes.is_empty() || is_low_information_plan(&draft.nodes, prompt) {
            tracing::debug!(nodes = draft.nodes.len(), "plan is low-information, retrying");
            match self.retry_plan(
                prompt,
                &planning_prompt,
                project_context.as_deref(),
                &draft.nodes,
            ) {
                Some(nodes) => {
                    draft.nodes = nodes;
                    draft.source = PlanSource::ModelRetry;
                }
                None => {
                    tracing::info!("retry did not produce a usable plan, using heuristic plan");
                    draft.nodes = heuristic_fallback_plan(prompt);
                    draft.source = PlanSource::HeuristicFallback;
                }
            }
        }
        Ok(draft)
    }

    /// One stricter re-prompt. Any failure yields `None`.
    ///
    /// `planning_prompt` is what the model sees; the plan is judged against
    /// the goal's own `prompt`.
    fn retry_plan(
        &self,
        prompt: &str,
        planning_prompt: &str,
        project_context: Option<&str>,
        previous: &[PlanNode],
    ) -> Option<Vec<PlanNode>> {
        let messages = [
            ChatMessage::system(PLANNING_SYSTEM),
            ChatMessage::user(strict_retry_user_prompt(
                planning_prompt,
                project_context,
                previous,
            )),
        ];
        let options = GenerationOptions::with_temperature(self.config.planning.retry_temperature)
            .tag("purpose", "plan-retry");
        let raw = match self.model.generate_response(&messages, &options) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("planning retry failed: {}", e);
                return None;
            }
        };
        let reply = match parse_plan_reply(&raw) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("planning retry reply unusable: {}", e);
                return None;
            }
        };
        let nodes = self.normalize(&reply.child_goals);
        if nodes.is_empty() || is_low_information_plan(&nodes, prompt) {
            return None;
        }
        Some(nodes)
    }

    fn normalize(&self, entries: &[Value]) -> Vec<PlanNode> {
        normalize_tree(
            entries,
            self.config.planning.max_depth,
            self.config.planning.max_nodes,
        )
    }

    /// Optional question request; failures are logged and yield no questions.
    fn request_model_questions(&self, prompt: &str) -> Vec<String> {
        let messages = [
            ChatMessage::system(QUESTIONS_SYSTEM),
            ChatMessage::user(questions_user_prompt(prompt)),
        ];
        let options = GenerationOptions::with_temperature(self.config.planning.temperature)
            .tag("purpose", "clarifying-questions");
        match self.model.generate_response(&messages, &options) {
            Ok(raw) => parse_questions_reply(&raw),
            Err(e) => {
                tracing::warn!("clarifying question request failed: {}", e);
                Vec::new()
            }
        }
    }

    fn persist_nodes(
        &self,
        parent: &Goal,
        nodes: &[PlanNode],
        request: &PlanRequest,
    ) -> Result<Vec<PersistedGoalNode>> {
        let mut persisted = Vec::with_capacity(nodes.len());
        for node in nodes {
            let created = self.create_goal_record(
                &parent.project_id,
                Some(parent),
                &node.prompt,
                Some(&node.title),
                &[],
                request.override_for(&node.prompt),
            )?;
            let children = self.persist_nodes(&created.goal, &node.children, request)?;
            persisted.push(PersistedGoalNode {
                goal: created.goal,
                children,
            });
        }
        Ok(persisted)
    }

    /// The already persisted plan below `goal`, if it has children.
    fn existing_plan(&self, goal: &Goal) -> Result<Option<PlanOutcome>> {
        let children = self.children_of(goal)?;
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(PlanOutcome {
            questions: goal.metadata.clarifying_questions.clone(),
            parent: goal.clone(),
            children,
        }))
    }

    fn children_of(&self, goal: &Goal) -> Result<Vec<PersistedGoalNode>> {
        let goals = self.store.list_goals(&goal.project_id, true)?;
        let mut by_parent: HashMap<Uuid, Vec<Goal>> = HashMap::new();
        for g in goals {
            if let Some(parent_id) = g.parent_goal_id {
                by_parent.entry(parent_id).or_default().push(g);
            }
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by(Goal::sibling_order);
        }
        let mut visited = HashSet::from([goal.id]);
        Ok(build_subtree(goal.id, &mut by_parent, &mut visited))
    }

    /// The persisted subtree rooted at `goal_id`.
    pub fn goal_tree(&self, goal_id: Uuid) -> Result<PersistedGoalNode> {
        let goal = self.require_goal(goal_id)?;
        let children = self.children_of(&goal)?;
        Ok(PersistedGoalNode { goal, children })
    }

    /// Drop the goal's current plan and plan again with the user's answer.
    ///
    /// Removing stale descendants is best effort. The answer is appended to
    /// the planning message and kept under `clarificationAnswers`; the goal's
    /// own prompt is left as is.
    pub fn replan_goal(&self, goal_id: Uuid, clarification: &str) -> Result<PlanOutcome> {
        let clarification = clarification.trim();
        if clarification.is_empty() {
            return Err(OrchestratorError::required("clarification"));
        }
        let tree = self.goal_tree(goal_id)?;
        let fully_removed = self.remove_descendants(&tree);
        if !fully_removed {
            tracing::warn!(goal_id = %goal_id, "stale goals remain, planning a fresh tree anyway");
        }

        let goal = tree.goal;
        let mut metadata = goal.metadata.clone();
        let mut answers: Vec<String> = metadata
            .extra
            .get(CLARIFICATION_ANSWERS_KEY)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        answers.push(clarification.to_string());
        metadata.extra.insert(
            CLARIFICATION_ANSWERS_KEY.to_string(),
            json!(dedupe_preserving_order(answers)),
        );
        self.store.update_goal_status(goal.id, goal.status, metadata)?;

        let mut request = PlanRequest::new(goal.project_id.clone(), goal.prompt.clone())
            .for_goal(goal.id)
            .with_clarification(clarification);
        request.replace_existing = true;
        self.plan_goal(request)
    }

    /// Delete `node`'s descendants deepest first. A goal is only deleted once
    /// all of its own descendants are gone, so a failed delete never leaves
    /// an orphan. Returns whether everything was removed.
    fn remove_descendants(&self, node: &PersistedGoalNode) -> bool {
        let mut all_removed = true;
        for child in &node.children {
            if !self.remove_descendants(child) {
                all_removed = false;
                continue;
            }
            match self.store.delete_goal(child.goal.id) {
                Ok(_) => tracing::debug!(goal_id = %child.goal.id, "removed stale goal"),
                Err(e) => {
                    tracing::warn!(goal_id = %child.goal.id, "failed to remove stale goal: {}", e);
                    all_removed = false;
                }
            }
        }
        all_removed
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Move a goal to another phase, merging `patch` into its metadata.
    pub fn advance_goal_phase(
        &self,
        goal_id: Uuid,
        target: &str,
        patch: Option<MetadataPatch>,
    ) -> Result<Goal> {
        let goal = self.require_goal(goal_id)?;
        let next = validate_phase_transition(goal.status.as_str(), target)?;
        let metadata = merge_patch(goal.metadata.clone(), patch.as_ref());
        let updated = self.store.update_goal_status(goal_id, next, metadata)?;
        tracing::info!(goal_id = %goal_id, "phase {} -> {}", goal.status, next);
        self.events
            .dispatch(&GoalEvent::phase_changed(goal_id, goal.status, next));
        Ok(updated)
    }

    /// Move a goal to another lifecycle state, merging `patch` into its metadata.
    pub fn advance_goal_state(
        &self,
        goal_id: Uuid,
        target: &str,
        patch: Option<MetadataPatch>,
    ) -> Result<Goal> {
        let goal = self.require_goal(goal_id)?;
        let next = validate_state_transition(goal.lifecycle_state.as_str(), target)?;
        let metadata = merge_patch(goal.metadata.clone(), patch.as_ref());
        let updated = self
            .store
            .update_goal_lifecycle_state(goal_id, next, metadata)?;
        tracing::info!(goal_id = %goal_id, "lifecycle {} -> {}", goal.lifecycle_state, next);
        self.events
            .dispatch(&GoalEvent::state_changed(goal_id, goal.lifecycle_state, next));
        Ok(updated)
    }

    /// The goal's working branch, asking the branch provider once and
    /// caching the answer. `None` when no provider is configured.
    pub fn ensure_branch(&self, goal_id: Uuid) -> Result<Option<String>> {
        let goal = self.require_goal(goal_id)?;
        if let Some(branch) = goal.branch_name.as_deref().filter(|b| !b.is_empty()) {
            return Ok(Some(branch.to_string()));
        }
        let Some(provider) = &self.branches else {
            return Ok(None);
        };
        let branch = provider.branch_name_for(&goal)?;
        self.store.update_goal_branch(goal_id, &branch)?;
        tracing::info!(goal_id = %goal_id, "using branch {}", branch);
        Ok(Some(branch))
    }

    fn require_goal(&self, goal_id: Uuid) -> Result<Goal> {
        self.store
            .get_goal(goal_id)?
            .ok_or(OrchestratorError::GoalNotFound(goal_id))
    }
}

fn validate_request<'a>(project_id: &'a str, prompt: &'a str) -> Result<(&'a str, &'a str)> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(OrchestratorError::required("projectId"));
    }
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(OrchestratorError::required("prompt"));
    }
    Ok((project_id, prompt))
}

fn merge_patch(metadata: GoalMetadata, patch: Option<&MetadataPatch>) -> GoalMetadata {
    match patch {
        Some(patch) => metadata.merged(patch),
        None => metadata,
    }
}

fn build_subtree(
    parent_id: Uuid,
    by_parent: &mut HashMap<Uuid, Vec<Goal>>,
    visited: &mut HashSet<Uuid>,
) -> Vec<PersistedGoalNode> {
    let Some(children) = by_parent.remove(&parent_id) else {
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(children.len());
    for child in children {
        if !visited.insert(child.id) {
            continue;
        }
        let grandchildren = build_subtree(child.id, by_parent, visited);
        nodes.push(PersistedGoalNode {
            goal: child,
            children: grandchildren,
        });
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelError;
    use gf_goal::{GoalPhase, JsonGoalStore, LifecycleState};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct Scripted(Mutex<Vec<std::result::Result<String, String>>>);

    impl LanguageModelClient for Scripted {
        fn generate_response(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> std::result::Result<String, ModelError> {
            let mut replies = self.0.lock().unwrap();
            if replies.is_empty() {
                return Err(ModelError::Unavailable("no scripted reply".into()));
            }
            replies.remove(0).map_err(ModelError::Request)
        }
    }

    fn orchestrator(dir: &std::path::Path, replies: Vec<&str>) -> GoalOrchestrator {
        let store = Arc::new(JsonGoalStore::new(dir).unwrap());
        let model = Arc::new(Scripted(Mutex::new(
            replies.into_iter().map(|r| Ok(r.to_string())).collect(),
        )));
        let mut config = PlannerConfig::default();
        config.planning.deterministic = true;
        GoalOrchestrator::new(store, model).with_config(config)
    }

    #[test]
    fn validation_happens_before_any_call() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path(), vec![]);
        let err = orch.create_goal_from_prompt("  ", "Add login", None).unwrap_err();
        assert_eq!(err.to_string(), "projectId is required");
        let err = orch.plan_goal_from_prompt("p1", "\n", None).unwrap_err();
        assert_eq!(err.to_string(), "prompt is required");
    }

    #[test]
    fn bug_prompt_gets_clarification_seed_task() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path(), vec![]);
        let created = orch.create_goal_from_prompt("p1", "  Fix the login bug ", None).unwrap();
        assert_eq!(created.goal.prompt, "Fix the login bug");
        assert_eq!(created.goal.title, "Fix The Login Bug");
        assert_eq!(created.goal.status, GoalPhase::Planning);
        assert_eq!(created.goal.lifecycle_state, LifecycleState::Draft);
        assert_eq!(created.goal.metadata.clarifying_questions.len(), 2);
        assert_eq!(created.tasks.len(), 1);
        assert_eq!(created.tasks[0].kind, GoalTaskKind::Clarification);
    }

    #[test]
    fn specified_prompt_gets_analysis_seed_task() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path(), vec![]);
        let created = orch
            .create_goal_from_prompt(
                "p1",
                "Add a profile page\nAcceptance Criteria:\n- shows the avatar",
                Some("Profile Page"),
            )
            .unwrap();
        assert_eq!(created.goal.title, "Profile Page");
        assert_eq!(created.tasks[0].kind, GoalTaskKind::Analysis);
        assert_eq!(
            created.tasks[0].payload["acceptanceCriteria"],
            json!(["shows the avatar"])
        );
    }

    #[test]
    fn child_goal_checks_parent_and_project() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path(), vec![]);
        let parent = orch
            .create_goal_from_prompt("p1", "Build checkout flow with payments", None)
            .unwrap()
            .goal;

        let missing = Uuid::new_v4();
        let err = orch
            .create_child_goal("p1", missing, "Add cart", None)
            .unwrap_err();
        assert_eq!(err.to_string(), format!("parent goal not found: {}", missing));

        let err = orch
            .create_child_goal("p2", parent.id, "Add cart", None)
            .unwrap_err();
        assert_eq!(err.to_string(), "child goal must use same projectId");

        let child = orch.create_child_goal("p1", parent.id, "Add cart", None).unwrap();
        assert_eq!(child.parent_goal_id, Some(parent.id));
    }

    #[test]
    fn advance_merges_patch_and_rejects_bad_edges() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path(), vec![]);
        let goal = orch
            .create_goal_from_prompt("p1", "Fix the login bug", None)
            .unwrap()
            .goal;

        let err = orch.advance_goal_phase(goal.id, "ready", None).unwrap_err();
        assert_eq!(err.to_string(), "invalid phase transition from planning to ready");
        let err = orch.advance_goal_state(goal.id, "paused", None).unwrap_err();
        assert_eq!(err.to_string(), "unknown goal state: paused");

        let updated = orch
            .advance_goal_phase(goal.id, "testing", Some(MetadataPatch::suppressing_questions()))
            .unwrap();
        assert_eq!(updated.status, GoalPhase::Testing);
        assert!(updated.metadata.clarifying_questions.is_empty());

        let updated = orch.advance_goal_state(goal.id, "planned", None).unwrap();
        assert_eq!(updated.lifecycle_state, LifecycleState::Planned);
        assert_eq!(updated.status, GoalPhase::Testing);

        let missing = Uuid::new_v4();
        let err = orch.advance_goal_state(missing, "planned", None).unwrap_err();
        assert_eq!(err.to_string(), format!("goal not found: {}", missing));
    }

    #[test]
    fn subtree_lists_children_oldest_first() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path(), vec![]);
        let root = orch
            .create_goal_from_prompt("p1", "Build checkout flow with payments", None)
            .unwrap()
            .goal;
        let first = orch.create_child_goal("p1", root.id, "Add cart page", None).unwrap();
        let second = orch.create_child_goal("p1", root.id, "Add payment form", None).unwrap();
        let nested = orch
            .create_child_goal("p1", first.id, "Add cart totals", None)
            .unwrap();

        let tree = orch.goal_tree(root.id).unwrap();
        assert_eq!(tree.node_count(), 4);
        let ids: Vec<Uuid> = tree.children.iter().map(|n| n.goal.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(tree.children[0].children[0].goal.id, nested.id);
    }
}

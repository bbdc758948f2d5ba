//! The Validator agent (spec §4.7, C7): combines a geometric check, a
//! semantic (naming-convention) check, and one LLM review call into a
//! single weighted `ValidationResult`.

use crate::common::build_chain;
use crate::error::{AgentError, Result};
use crate::resolver::ModelResolver;
use domain::{ExecutionResult, Issue, RunState, Severity, TaskGraph, ValidationResult};
use langgraph_core::llm::ChatRequest;
use langgraph_core::Message;
use llm::{call_with_fallback, AgentModelRegistry, AgentRole};
use prompts::{classify, PromptRegistry};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Validator {
    registry: Arc<AgentModelRegistry>,
    resolver: Arc<dyn ModelResolver>,
    prompts: Arc<PromptRegistry>,
}

/// What the LLM review sub-check asks for: a 0-1 score and any issues it
/// noticed that the mechanical checks can't see (intent mismatch, odd
/// proportions, missing features implied by the prompt).
#[derive(Debug, Deserialize)]
struct LlmReview {
    score: f64,
    issues: Vec<ReviewIssue>,
}

#[derive(Debug, Deserialize)]
struct ReviewIssue {
    category: String,
    severity: Severity,
    description: String,
    #[serde(default)]
    suggested_fix: Option<String>,
}

impl Validator {
    pub fn new(
        registry: Arc<AgentModelRegistry>,
        resolver: Arc<dyn ModelResolver>,
        prompts: Arc<PromptRegistry>,
    ) -> Self {
        Self {
            registry,
            resolver,
            prompts,
        }
    }

    /// spec §4.7: run all three checks, combine with the fixed 0.4/0.4/0.2
    /// weighting, and return the decision with the top-5 issues attached.
    pub async fn validate(&self, state: &RunState) -> Result<ValidationResult> {
        let graph = state
            .task_graph
            .as_ref()
            .ok_or_else(|| AgentError::ValidationError("no task graph on run state".into()))?;
        let execution = state
            .execution_result
            .as_ref()
            .ok_or_else(|| AgentError::ValidationError("no execution result on run state".into()))?;

        let (geometric_score, mut geometric_issues) = self.check_geometric(graph, execution);
        let (semantic_score, mut semantic_issues) = self.check_semantic(graph, execution);
        let (llm_score, mut llm_issues) = self.check_llm_review(state, graph, execution).await?;

        let mut issues = Vec::new();
        issues.append(&mut geometric_issues);
        issues.append(&mut semantic_issues);
        issues.append(&mut llm_issues);

        Ok(ValidationResult::combine(geometric_score, semantic_score, llm_score, issues))
    }

    /// spec §4.7 step 1: three per-run/per-object checks — object count
    /// within `[1, expected_count * 2]`, every object's volume positive and
    /// below `MAX_REASONABLE_VOLUME`, every bounding box finite. Score is
    /// the fraction of checks passed, counting the count-bound check once
    /// and the per-object checks once per object.
    fn check_geometric(&self, graph: &TaskGraph, execution: &ExecutionResult) -> (f64, Vec<Issue>) {
        const MAX_REASONABLE_VOLUME: f64 = 1.0e9;

        let mut issues = Vec::new();
        let expected_count = graph.nodes.len();
        let actual_count = execution.created_objects.len();
        let mut checks_passed = 0usize;
        let mut checks_total = 1usize;

        if actual_count >= 1 && actual_count <= expected_count * 2 {
            checks_passed += 1;
        } else {
            issues.push(Issue {
                category: "geometric".into(),
                severity: Severity::Critical,
                description: format!(
                    "expected between 1 and {} objects for {} task nodes, execution produced {}",
                    expected_count * 2,
                    expected_count,
                    actual_count,
                ),
                suggested_fix: None,
            });
        }

        for object in &execution.created_objects {
            checks_total += 2;
            if object.bounding_box.is_finite() {
                checks_passed += 1;
            } else {
                issues.push(Issue {
                    category: "geometric".into(),
                    severity: Severity::High,
                    description: format!("object {} has a non-finite bounding box", object.name),
                    suggested_fix: None,
                });
            }
            if object.volume > 0.0 && object.volume < MAX_REASONABLE_VOLUME {
                checks_passed += 1;
            } else {
                issues.push(Issue {
                    category: "geometric".into(),
                    severity: Severity::High,
                    description: format!(
                        "object {} has volume {} outside (0, {})",
                        object.name, object.volume, MAX_REASONABLE_VOLUME
                    ),
                    suggested_fix: None,
                });
            }
        }

        (checks_passed as f64 / checks_total as f64, issues)
    }

    /// spec §4.7 step 2: every task node should have produced at least one
    /// object whose name carries its `<node_id>_` prefix (the Generator's
    /// naming convention). Score is the fraction of nodes satisfied.
    fn check_semantic(&self, graph: &TaskGraph, execution: &ExecutionResult) -> (f64, Vec<Issue>) {
        if graph.nodes.is_empty() {
            return (0.0, Vec::new());
        }

        let produced: HashSet<&str> = execution
            .created_objects
            .iter()
            .filter_map(|o| o.originating_node_id())
            .collect();

        let mut issues = Vec::new();
        let mut satisfied = 0usize;
        for node in &graph.nodes {
            if produced.contains(node.id.as_str()) {
                satisfied += 1;
            } else {
                issues.push(Issue {
                    category: "semantic".into(),
                    severity: Severity::Medium,
                    description: format!(
                        "node {} ({}) produced no object with a matching naming prefix",
                        node.id, node.operation
                    ),
                    suggested_fix: Some(format!(
                        "ensure the {} operation names its result \"{}_...\"",
                        node.operation, node.id
                    )),
                });
            }
        }

        let score = satisfied as f64 / graph.nodes.len() as f64;
        (score, issues)
    }

    /// spec §4.7 step 3: one JSON-mode LLM call asking whether the executed
    /// design actually satisfies the user's intent, independent of whether
    /// it ran without error.
    async fn check_llm_review(
        &self,
        state: &RunState,
        graph: &TaskGraph,
        execution: &ExecutionResult,
    ) -> Result<(f64, Vec<Issue>)> {
        let complexity = classify(&state.user_prompt);
        let block = self.prompts.get(AgentRole::Validator, complexity);
        let chain = build_chain(&self.registry, self.resolver.as_ref(), AgentRole::Validator)?;
        let spec = self
            .registry
            .spec(AgentRole::Validator)
            .expect("build_chain already validated a spec exists");

        let object_summaries = execution
            .created_objects
            .iter()
            .map(|o| format!("{} ({}, volume {:.3})", o.name, o.object_type, o.volume))
            .collect::<Vec<_>>()
            .join(", ");

        let messages = vec![
            Message::system(block.system_prompt.clone()),
            Message::human(format!(
                "Original design request: {}\n\nTask graph: {}\n\nObjects produced: [{}]\n\n\
                 Respond with JSON: {{\"score\": <0.0-1.0>, \"issues\": [{{\"category\": str, \
                 \"severity\": \"low\"|\"medium\"|\"high\"|\"critical\", \"description\": str, \
                 \"suggested_fix\": str or null}}]}}. Score how well the produced objects satisfy \
                 the original request.",
                state.user_prompt,
                serde_json::to_string(graph).unwrap_or_default(),
                object_summaries,
            )),
        ];

        let request = ChatRequest::new(messages)
            .with_temperature(spec.default_temperature)
            .with_max_tokens(spec.default_max_tokens);
        let outcome = call_with_fallback(&chain, request)
            .await
            .map_err(|e| AgentError::ValidationError(e.to_string()))?;
        let text = outcome.response.message.text().unwrap_or_default().to_string();

        let review: LlmReview = parse_review(&text)
            .map_err(|e| AgentError::ValidationError(format!("malformed llm review response: {e}")))?;

        let issues = review
            .issues
            .into_iter()
            .map(|i| Issue {
                category: i.category,
                severity: i.severity,
                description: i.description,
                suggested_fix: i.suggested_fix,
            })
            .collect();

        Ok((review.score.clamp(0.0, 1.0), issues))
    }
}

fn parse_review(text: &str) -> std::result::Result<LlmReview, String> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let stripped = stripped.strip_suffix("```").unwrap_or(stripped).trim();
    serde_json::from_str(stripped).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{BoundingBox, ObjectSummary, TaskNode};
    use langgraph_core::error::Result as GraphResult;
    use langgraph_core::llm::{ChatModel, ChatResponse, ChatStreamResponse};
    use langgraph_core::{MessageContent, MessageRole};
    use llm::{AgentModelRegistry, ModelSpec};

    #[derive(Clone)]
    struct FixedModel(String);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn chat(&self, _request: ChatRequest) -> GraphResult<ChatResponse> {
            Ok(ChatResponse {
                message: Message {
                    id: None,
                    role: MessageRole::Assistant,
                    content: MessageContent::Text(self.0.clone()),
                    name: None,
                    tool_calls: None,
                    tool_call_id: None,
                    metadata: None,
                },
                usage: None,
                reasoning: None,
                metadata: Default::default(),
            })
        }

        async fn stream(&self, _request: ChatRequest) -> GraphResult<ChatStreamResponse> {
            unimplemented!()
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    fn registry() -> Arc<AgentModelRegistry> {
        Arc::new(AgentModelRegistry::new().with_spec(AgentRole::Validator, ModelSpec::new("test-model", vec![])))
    }

    fn object(name: &str, volume: f64) -> ObjectSummary {
        ObjectSummary {
            name: name.to_string(),
            object_type: "Part::Box".into(),
            bounding_box: BoundingBox {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 1.0, 1.0],
            },
            volume,
            face_count: 6,
            parent_ids: Vec::new(),
        }
    }

    fn base_state() -> RunState {
        let mut state = RunState::new("Create a box", 5);
        state.task_graph = Some(TaskGraph::new(vec![TaskNode::new("n1", "create_box")]));
        state
    }

    #[tokio::test]
    async fn well_formed_run_passes() {
        let resolver = Arc::new(
            crate::resolver::StaticModelResolver::new()
                .with_model("test-model", Arc::new(FixedModel(r#"{"score": 1.0, "issues": []}"#.to_string()))),
        );
        let validator = Validator::new(registry(), resolver, Arc::new(PromptRegistry::load()));

        let mut state = base_state();
        state.execution_result = Some(ExecutionResult {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            created_objects: vec![object("n1_box", 6.0)],
            errors: Vec::new(),
            artifact_paths: Vec::new(),
            duration_ms: 10,
        });

        let result = validator.validate(&state).await.unwrap();
        assert_eq!(result.decision, domain::ValidationDecision::Pass);
    }

    #[tokio::test]
    async fn missing_objects_fail_geometric_and_semantic_checks() {
        let resolver = Arc::new(
            crate::resolver::StaticModelResolver::new()
                .with_model("test-model", Arc::new(FixedModel(r#"{"score": 0.0, "issues": []}"#.to_string()))),
        );
        let validator = Validator::new(registry(), resolver, Arc::new(PromptRegistry::load()));

        let mut state = base_state();
        state.execution_result = Some(ExecutionResult {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            created_objects: Vec::new(),
            errors: Vec::new(),
            artifact_paths: Vec::new(),
            duration_ms: 10,
        });

        let result = validator.validate(&state).await.unwrap();
        assert_eq!(result.decision, domain::ValidationDecision::Fail);
        assert!(!result.issues.is_empty());
    }

    #[tokio::test]
    async fn unmatched_node_prefix_downgrades_semantic_score() {
        let resolver = Arc::new(
            crate::resolver::StaticModelResolver::new()
                .with_model("test-model", Arc::new(FixedModel(r#"{"score": 1.0, "issues": []}"#.to_string()))),
        );
        let validator = Validator::new(registry(), resolver, Arc::new(PromptRegistry::load()));

        let mut state = base_state();
        state.execution_result = Some(ExecutionResult {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            created_objects: vec![object("other_box", 6.0)],
            errors: Vec::new(),
            artifact_paths: Vec::new(),
            duration_ms: 10,
        });

        let result = validator.validate(&state).await.unwrap();
        assert!((result.semantic_score - 0.0).abs() < 1e-9);
    }
}

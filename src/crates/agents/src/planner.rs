//! The Planner agent (spec §4.5, C5): converts a user prompt — or, on
//! replanning, a prior validation's issues — into a validated `TaskGraph`.

use crate::common::{build_chain, call_json};
use crate::error::{AgentError, Result};
use crate::resolver::ModelResolver;
use domain::{DomainError, Issue, RunState, TaskGraph};
use langgraph_core::Message;
use llm::{AgentModelRegistry, AgentRole};
use prompts::{classify, PromptRegistry};
use std::sync::Arc;

pub struct Planner {
    registry: Arc<AgentModelRegistry>,
    resolver: Arc<dyn ModelResolver>,
    prompts: Arc<PromptRegistry>,
}

impl Planner {
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

    /// spec §4.5: build request, call in JSON mode, parse (with one
    /// correction retry baked into `call_json`), then check DAG-ness and
    /// dependency resolution (steps 4-5).
    pub async fn plan(&self, state: &RunState) -> Result<TaskGraph> {
        self.plan_inner(&state.user_prompt, None).await
    }

    /// spec §4.5 "Replanning": identical, but the user message includes
    /// the failing validation's top-5 issues ordered by severity.
    pub async fn replan(&self, state: &RunState) -> Result<TaskGraph> {
        let issues = state
            .validation_result
            .as_ref()
            .map(|v| v.issues.as_slice())
            .unwrap_or(&[]);
        self.plan_inner(&state.user_prompt, Some(issues)).await
    }

    async fn plan_inner(&self, user_prompt: &str, prior_issues: Option<&[Issue]>) -> Result<TaskGraph> {
        let complexity = classify(user_prompt);
        let block = self.prompts.get(AgentRole::Planner, complexity);
        let chain = build_chain(&self.registry, self.resolver.as_ref(), AgentRole::Planner)?;
        let spec = self
            .registry
            .spec(AgentRole::Planner)
            .expect("build_chain already validated a spec exists");

        let mut messages = vec![Message::system(block.system_prompt.clone())];
        for example in &block.few_shot {
            messages.push(Message::human("Example task graph:"));
            messages.push(Message::assistant(example.clone()));
        }

        let mut user_message = format!("Design request: {user_prompt}");
        if let Some(issues) = prior_issues {
            if !issues.is_empty() {
                user_message.push_str("\n\nThe previous attempt failed validation. Top issues, most severe first:\n");
                for issue in issues {
                    user_message.push_str(&format!(
                        "- [{:?}] {}: {}\n",
                        issue.severity, issue.category, issue.description
                    ));
                }
                user_message.push_str("Revise the plan to address these issues.");
            }
        }
        messages.push(Message::human(user_message));

        let graph: TaskGraph = call_json(&chain, messages, spec.default_temperature, spec.default_max_tokens)
            .await
            .map_err(|e| match e {
                AgentError::MalformedResponse(msg) => AgentError::PlanningError(msg),
                other => other,
            })?;

        graph.topological_sort().map_err(|e| match e {
            DomainError::CyclicGraph => AgentError::PlanningError("task graph contains a cycle".into()),
            DomainError::DanglingDependency(node, dep) => AgentError::PlanningError(format!(
                "node {node:?} depends on unknown node {dep:?}"
            )),
            DomainError::EmptyGraph => AgentError::PlanningError("task graph has no nodes".into()),
            other => AgentError::PlanningError(other.to_string()),
        })?;

        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use langgraph_core::error::Result as GraphResult;
    use langgraph_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStreamResponse};
    use langgraph_core::{MessageContent, MessageRole};
    use llm::{AgentModelRegistry, ModelSpec};

    #[derive(Clone)]
    struct FixedModel(&'static str);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn chat(&self, _request: ChatRequest) -> GraphResult<ChatResponse> {
            Ok(ChatResponse {
                message: Message {
                    id: None,
                    role: MessageRole::Assistant,
                    content: MessageContent::Text(self.0.to_string()),
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

    fn registry_with(spec: ModelSpec) -> Arc<AgentModelRegistry> {
        Arc::new(AgentModelRegistry::new().with_spec(AgentRole::Planner, spec))
    }

    #[tokio::test]
    async fn plans_a_single_box_from_valid_json() {
        let registry = registry_with(ModelSpec::new("test-model", vec![]));
        let resolver = Arc::new(
            crate::resolver::StaticModelResolver::new().with_model(
                "test-model",
                Arc::new(FixedModel(
                    r#"{"nodes":[{"id":"n1","operation":"create_box","parameters":{"length":10.0,"width":20.0,"height":30.0},"dependencies":[]}]}"#,
                )),
            ),
        );
        let planner = Planner::new(registry, resolver, Arc::new(PromptRegistry::load()));
        let state = RunState::new("Create a box 10x20x30 mm", 5);
        let graph = planner.plan(&state).await.unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].operation, "create_box");
    }

    #[tokio::test]
    async fn cyclic_graph_fails_as_planning_error() {
        let registry = registry_with(ModelSpec::new("test-model", vec![]));
        let resolver = Arc::new(crate::resolver::StaticModelResolver::new().with_model(
            "test-model",
            Arc::new(FixedModel(
                r#"{"nodes":[{"id":"a","operation":"create_box","parameters":{},"dependencies":["b"]},{"id":"b","operation":"create_box","parameters":{},"dependencies":["a"]}]}"#,
            )),
        ));
        let planner = Planner::new(registry, resolver, Arc::new(PromptRegistry::load()));
        let state = RunState::new("anything", 5);
        let err = planner.plan(&state).await.unwrap_err();
        assert!(matches!(err, AgentError::PlanningError(_)));
    }

    #[tokio::test]
    async fn empty_node_list_is_a_planning_error() {
        let registry = registry_with(ModelSpec::new("test-model", vec![]));
        let resolver = Arc::new(
            crate::resolver::StaticModelResolver::new()
                .with_model("test-model", Arc::new(FixedModel(r#"{"nodes":[]}"#))),
        );
        let planner = Planner::new(registry, resolver, Arc::new(PromptRegistry::load()));
        let state = RunState::new("anything", 5);
        let err = planner.plan(&state).await.unwrap_err();
        assert!(matches!(err, AgentError::PlanningError(_)));
    }
}

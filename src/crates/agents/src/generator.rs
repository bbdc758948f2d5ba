//! The Generator agent (spec §4.6, C6): converts a full task graph into an
//! executable script, one LLM call per node, then validates the assembled
//! script against the sandbox's static checker before handing it back.

use crate::common::build_chain;
use crate::error::{AgentError, Result};
use crate::resolver::ModelResolver;
use domain::{RunState, Script, TaskGraph, TaskNode};
use langgraph_core::llm::ChatRequest;
use langgraph_core::Message;
use llm::{call_with_fallback, AgentModelRegistry, AgentRole};
use prompts::{classify, PromptRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Modules every generated script is allowed to import — echoed verbatim
/// into the script header (spec §4.6 step 4: "a header that imports
/// whitelisted modules").
const SCRIPT_HEADER: &str =
    "import FreeCAD\nimport Part\nimport PartDesign\nimport Sketcher\nimport Draft\nimport Mesh\nimport math\n\n";

pub struct Generator {
    registry: Arc<AgentModelRegistry>,
    resolver: Arc<dyn ModelResolver>,
    prompts: Arc<PromptRegistry>,
}

impl Generator {
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

    /// spec §4.6: one fragment per node in topological order, concatenated
    /// under a whitelisted-import header, then validated; on rejection,
    /// one correction pass over the whole script before giving up.
    pub async fn generate(&self, state: &RunState) -> Result<Script> {
        let graph = state
            .task_graph
            .as_ref()
            .ok_or_else(|| AgentError::GenerationError("no task graph on run state".into()))?;

        let refinement = state.iteration > 0 && state.validation_result.is_some();

        let body = if refinement {
            self.generate_refinement(state, graph).await?
        } else {
            self.generate_fresh(graph).await?
        };

        let full_script = format!("{SCRIPT_HEADER}{body}");
        let outcome = sandbox::validate(&full_script);
        if outcome.ok {
            let last_node = graph.nodes.last().map(|n| n.id.clone()).unwrap_or_default();
            let mut script = Script::new(full_script, last_node);
            script.ast_check_passed = true;
            return Ok(script);
        }

        tracing::warn!(reasons = ?outcome.reasons, "generated script failed static validation, attempting one correction pass");
        let corrected_body = self.correct(&full_script, &outcome.reasons).await?;
        let corrected_full = format!("{SCRIPT_HEADER}{corrected_body}");
        let retry_outcome = sandbox::validate(&corrected_full);
        if !retry_outcome.ok {
            return Err(AgentError::GenerationError(retry_outcome.reasons.join("; ")));
        }

        let last_node = graph.nodes.last().map(|n| n.id.clone()).unwrap_or_default();
        let mut script = Script::new(corrected_full, last_node);
        script.ast_check_passed = true;
        Ok(script)
    }

    async fn generate_fresh(&self, graph: &TaskGraph) -> Result<String> {
        let order = graph
            .topological_sort()
            .map_err(|e| AgentError::GenerationError(e.to_string()))?;

        let mut produced: HashMap<String, &str> = HashMap::new();
        let mut fragments = Vec::with_capacity(order.len());

        for node_id in &order {
            let node = graph.node(node_id).expect("id came from this graph's own sort");
            let fragment = self.generate_node_fragment(node, &produced).await?;
            fragments.push(fragment);
            produced.insert(node.id.clone(), node.operation.as_str());
        }

        Ok(fragments.join("\n\n"))
    }

    async fn generate_node_fragment(
        &self,
        node: &TaskNode,
        produced: &HashMap<String, &str>,
    ) -> Result<String> {
        let complexity = classify(&node.operation);
        let block = self.prompts.get(AgentRole::Generator, complexity);
        let chain = build_chain(&self.registry, self.resolver.as_ref(), AgentRole::Generator)?;
        let spec = self
            .registry
            .spec(AgentRole::Generator)
            .expect("build_chain already validated a spec exists");

        let mut messages = vec![Message::system(block.system_prompt.clone())];
        if let Some(reference) = self.prompts.api_reference(&node.operation) {
            messages.push(Message::human(format!("CAD API reference: {reference}")));
        }

        let preceding = produced
            .iter()
            .map(|(id, op)| format!("{id} (produced by {op})"))
            .collect::<Vec<_>>()
            .join(", ");

        messages.push(Message::human(format!(
            "Node id: {}\nOperation: {}\nParameters: {}\nDependencies: {:?}\nObjects already in scope: [{}]\n\
             Emit only the Python statements for this node. Name every object you create with the \
             prefix \"{}_\".",
            node.id,
            node.operation,
            serde_json::to_string(&node.parameters).unwrap_or_default(),
            node.dependencies,
            preceding,
            node.id,
        )));

        let request = ChatRequest::new(messages)
            .with_temperature(spec.default_temperature)
            .with_max_tokens(spec.default_max_tokens);
        let outcome = call_with_fallback(&chain, request).await?;
        Ok(outcome.response.message.text().unwrap_or_default().to_string())
    }

    /// spec §4.6 "Refinement mode": re-enter Generator after a REFINE
    /// decision with the prior script, its stderr, and the validator's
    /// issues; ask for a full corrected script rather than a patch.
    async fn generate_refinement(&self, state: &RunState, graph: &TaskGraph) -> Result<String> {
        let prior_script = state
            .current_script
            .as_ref()
            .map(|s| s.source_text.clone())
            .unwrap_or_default();
        let prior_stderr = state
            .execution_result
            .as_ref()
            .map(|r| r.stderr.clone())
            .unwrap_or_default();
        let issues = state
            .validation_result
            .as_ref()
            .map(|v| v.issues.clone())
            .unwrap_or_default();

        let complexity = classify(&state.user_prompt);
        let block = self.prompts.get(AgentRole::Generator, complexity);
        let chain = build_chain(&self.registry, self.resolver.as_ref(), AgentRole::Generator)?;
        let spec = self
            .registry
            .spec(AgentRole::Generator)
            .expect("build_chain already validated a spec exists");

        let issues_text = issues
            .iter()
            .map(|i| format!("- [{:?}] {}: {}", i.severity, i.category, i.description))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = vec![
            Message::system(block.system_prompt.clone()),
            Message::human(format!(
                "The previous script did not fully satisfy the design intent.\n\nPrior script:\n{prior_script}\n\n\
                 Prior stderr:\n{prior_stderr}\n\nValidator issues:\n{issues_text}\n\n\
                 Task graph: {}\n\nEmit a complete, corrected script body (not a diff) addressing every issue.",
                serde_json::to_string(graph).unwrap_or_default(),
            )),
        ];

        let request = ChatRequest::new(messages)
            .with_temperature(spec.default_temperature)
            .with_max_tokens(spec.default_max_tokens);
        let outcome = call_with_fallback(&chain, request).await?;
        Ok(outcome.response.message.text().unwrap_or_default().to_string())
    }

    async fn correct(&self, script: &str, reasons: &[String]) -> Result<String> {
        let chain = build_chain(&self.registry, self.resolver.as_ref(), AgentRole::Generator)?;
        let spec = self
            .registry
            .spec(AgentRole::Generator)
            .expect("build_chain already validated a spec exists");
        let block = self.prompts.get(AgentRole::Generator, prompts::Complexity::Simple);

        let messages = vec![
            Message::system(block.system_prompt.clone()),
            Message::human(format!(
                "This script was rejected by static validation for these reasons:\n{}\n\nScript:\n{script}\n\n\
                 Emit a corrected script body using only whitelisted imports (FreeCAD, Part, PartDesign, \
                 Sketcher, Draft, Mesh, math) and no blocked identifiers.",
                reasons.join("\n"),
            )),
        ];

        let request = ChatRequest::new(messages)
            .with_temperature(spec.default_temperature)
            .with_max_tokens(spec.default_max_tokens);
        let outcome = call_with_fallback(&chain, request).await?;
        Ok(outcome.response.message.text().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::ParamValue;
    use langgraph_core::error::Result as GraphResult;
    use langgraph_core::llm::{ChatModel, ChatStreamResponse};
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

    use langgraph_core::llm::ChatResponse;

    fn registry() -> Arc<AgentModelRegistry> {
        Arc::new(AgentModelRegistry::new().with_spec(AgentRole::Generator, ModelSpec::new("test-model", vec![])))
    }

    #[tokio::test]
    async fn generates_and_validates_a_single_node_script() {
        let resolver = Arc::new(crate::resolver::StaticModelResolver::new().with_model(
            "test-model",
            Arc::new(FixedModel(
                "n1_box = doc.addObject(\"Part::Box\", \"n1_box\")\nn1_box.Length = 10\n".to_string(),
            )),
        ));
        let generator = Generator::new(registry(), resolver, Arc::new(PromptRegistry::load()));

        let node = TaskNode::new("n1", "create_box").with_parameter("length", ParamValue::Number(10.0));
        let graph = TaskGraph::new(vec![node]);
        let mut state = RunState::new("Create a box", 5);
        state.task_graph = Some(graph);

        let script = generator.generate(&state).await.unwrap();
        assert!(script.ast_check_passed);
        assert!(script.source_text.contains("import Part"));
        assert!(script.source_text.contains("n1_box"));
    }

    #[tokio::test]
    async fn blocked_import_fails_generation_after_correction_retry() {
        let resolver = Arc::new(crate::resolver::StaticModelResolver::new().with_model(
            "test-model",
            Arc::new(FixedModel("import os\nos.system(\"rm -rf /\")\n".to_string())),
        ));
        let generator = Generator::new(registry(), resolver, Arc::new(PromptRegistry::load()));

        let node = TaskNode::new("n1", "create_box");
        let graph = TaskGraph::new(vec![node]);
        let mut state = RunState::new("malicious", 5);
        state.task_graph = Some(graph);

        let err = generator.generate(&state).await.unwrap_err();
        assert!(matches!(err, AgentError::GenerationError(_)));
    }
}

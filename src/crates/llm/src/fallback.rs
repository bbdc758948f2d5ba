//! Call-with-fallback: the core algorithm of spec §4.1.
//!
//! Given an ordered list of models, attempt the call against each in turn
//! with exponential backoff on retryable errors; advance to the next model
//! on a non-retryable error or once a model's retries are exhausted. If
//! every model in the chain fails, return `LlmError::AllModelsExhausted`
//! with every model's final error attached.

use crate::error::LlmError;
use langgraph_core::llm::{ChatModel, ChatRequest, ChatResponse};
use std::sync::Arc;
use std::time::Duration;
use tooling::async_utils::retry::is_retryable_error;

/// Exponential backoff parameters fixed by spec §4.1: base 1s, factor 2,
/// at most 3 retries per model (so up to 4 attempts total per model).
const BACKOFF_BASE_SECS: f64 = 1.0;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_RETRIES_PER_MODEL: usize = 3;

/// One named entry in a fallback chain: a model identifier paired with the
/// `ChatModel` that serves it.
#[derive(Clone)]
pub struct ModelEntry {
    pub id: String,
    pub model: Arc<dyn ChatModel>,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            id: id.into(),
            model,
        }
    }
}

/// The model id that actually answered, alongside its response.
pub struct FallbackOutcome {
    pub response: ChatResponse,
    pub model_id: String,
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_secs_f64(BACKOFF_BASE_SECS * BACKOFF_FACTOR.powi(attempt as i32))
}

/// Run `request` against `chain` in order, per spec §4.1's algorithm.
pub async fn call_with_fallback(
    chain: &[ModelEntry],
    request: ChatRequest,
) -> Result<FallbackOutcome, LlmError> {
    let mut attempts: Vec<(String, String)> = Vec::new();

    for entry in chain {
        let mut attempt = 0usize;
        loop {
            match entry.model.chat(request.clone()).await {
                Ok(response) => {
                    return Ok(FallbackOutcome {
                        response,
                        model_id: entry.id.clone(),
                    })
                }
                Err(err) => {
                    let message = err.to_string();
                    let retryable = is_retryable_error(&message);
                    attempts.push((entry.id.clone(), message));

                    if retryable && attempt < MAX_RETRIES_PER_MODEL {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    break;
                }
            }
        }
    }

    Err(LlmError::AllModelsExhausted(attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use langgraph_core::error::{GraphError, Result as GraphResult};
    use langgraph_core::llm::ChatStreamResponse;
    use langgraph_core::{Message, MessageContent, MessageRole};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct ScriptedModel {
        responses: Arc<Vec<GraphResult<&'static str>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<GraphResult<&'static str>>) -> Self {
            Self {
                responses: Arc::new(responses),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, _request: ChatRequest) -> GraphResult<ChatResponse> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.responses[idx.min(self.responses.len() - 1)] {
                Ok(text) => Ok(ChatResponse {
                    message: Message {
                        id: None,
                        role: MessageRole::Assistant,
                        content: MessageContent::Text(text.to_string()),
                        name: None,
                        tool_calls: None,
                        tool_call_id: None,
                        metadata: None,
                    },
                    usage: None,
                    reasoning: None,
                    metadata: Default::default(),
                }),
                Err(e) => Err(GraphError::Validation(e.to_string())),
            }
        }

        async fn stream(&self, _request: ChatRequest) -> GraphResult<ChatStreamResponse> {
            unimplemented!()
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![Message::human("hi")])
    }

    #[tokio::test]
    async fn succeeds_on_primary_model() {
        let model = ScriptedModel::new(vec![Ok("hello")]);
        let chain = vec![ModelEntry::new("primary", Arc::new(model))];
        let outcome = call_with_fallback(&chain, request()).await.unwrap();
        assert_eq!(outcome.model_id, "primary");
    }

    #[tokio::test]
    async fn non_retryable_error_advances_immediately_without_retry() {
        let primary = ScriptedModel::new(vec![Err(GraphError::Validation(
            "Authentication failed: bad key".into(),
        ))]);
        let fallback = ScriptedModel::new(vec![Ok("from fallback")]);
        let chain = vec![
            ModelEntry::new("primary", Arc::new(primary.clone())),
            ModelEntry::new("fallback", Arc::new(fallback)),
        ];
        let outcome = call_with_fallback(&chain, request()).await.unwrap();
        assert_eq!(outcome.model_id, "fallback");
        // Non-retryable error: exactly one call to the primary model.
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_models_exhausted_collects_every_error() {
        let primary = ScriptedModel::new(vec![Err(GraphError::Validation(
            "Authentication failed".into(),
        ))]);
        let fallback = ScriptedModel::new(vec![Err(GraphError::Validation(
            "Authentication failed".into(),
        ))]);
        let chain = vec![
            ModelEntry::new("primary", Arc::new(primary)),
            ModelEntry::new("fallback", Arc::new(fallback)),
        ];
        let err = call_with_fallback(&chain, request()).await.unwrap_err();
        match err {
            LlmError::AllModelsExhausted(attempts) => assert_eq!(attempts.len(), 2),
            other => panic!("expected AllModelsExhausted, got {other:?}"),
        }
    }
}

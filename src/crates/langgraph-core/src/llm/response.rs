//! Response types returned by [`ChatModel::chat`](crate::llm::ChatModel::chat)
//! and [`ChatModel::stream`](crate::llm::ChatModel::stream).

use crate::llm_stream::MessageChunkStream;
use crate::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token accounting for a single chat completion.
///
/// Providers populate this from whatever usage block their API returns;
/// `total_tokens` is always `input_tokens + output_tokens` regardless of
/// whether the provider reports a total directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Tokens spent on hidden reasoning/thinking, for models that report it
    /// separately from the final answer (OpenAI o1, DeepSeek R1, ...).
    pub reasoning_tokens: Option<usize>,
    pub total_tokens: usize,
}

impl UsageMetadata {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            reasoning_tokens: None,
            total_tokens: input_tokens + output_tokens,
        }
    }

    pub fn with_reasoning(input_tokens: usize, output_tokens: usize, reasoning_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            reasoning_tokens: Some(reasoning_tokens),
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// The extracted "thinking" content of a reasoning model, kept separate
/// from the final answer when `ReasoningMode::Separated` is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningContent {
    pub content: String,
}

impl ReasoningContent {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A complete (non-streaming) response from a [`ChatModel`](crate::llm::ChatModel).
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The model's answer.
    pub message: Message,
    /// Token usage for this call, if the provider reported it.
    pub usage: Option<UsageMetadata>,
    /// Separated thinking content, present only when requested and supported.
    pub reasoning: Option<ReasoningContent>,
    /// Provider-specific extras (model name actually used, stop reason, ...).
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A streaming response from [`ChatModel::stream`](crate::llm::ChatModel::stream).
///
/// `usage` is only populated once `stream` has been fully drained, mirroring
/// providers that only send the usage block in the final SSE event.
pub struct ChatStreamResponse {
    pub stream: MessageChunkStream,
    pub reasoning_stream: Option<MessageChunkStream>,
    pub usage: Option<UsageMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_totals_input_and_output() {
        let usage = UsageMetadata::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
        assert!(usage.reasoning_tokens.is_none());
    }

    #[test]
    fn usage_with_reasoning_carries_reasoning_tokens() {
        let usage = UsageMetadata::with_reasoning(10, 5, 100);
        assert_eq!(usage.reasoning_tokens, Some(100));
        assert_eq!(usage.total_tokens, 15);
    }
}

//! Shared plumbing used by all three agents: building a fallback chain for
//! a role, and making a JSON-mode call with the one-shot
//! schema-correction retry described in spec §4.1 ("JSON mode").

use crate::error::{AgentError, Result};
use crate::resolver::ModelResolver;
use llm::{call_with_fallback, AgentModelRegistry, AgentRole, ChatRequest, ModelEntry};
use langgraph_core::Message;
use serde::de::DeserializeOwned;

/// Resolve a role's `[primary, fallback...]` chain of model ids into
/// constructed `ModelEntry`s, in order. A model id with no resolver entry
/// is dropped from the chain rather than failing outright — this mirrors
/// "advance to the next model" when a model is simply unconfigured.
pub fn build_chain(
    registry: &AgentModelRegistry,
    resolver: &dyn ModelResolver,
    role: AgentRole,
) -> Result<Vec<ModelEntry>> {
    let spec = registry.spec(role).ok_or(AgentError::NoModelConfigured(role))?;
    let chain: Vec<ModelEntry> = spec
        .chain()
        .into_iter()
        .filter_map(|id| resolver.resolve(&id).map(|model| ModelEntry::new(id, model)))
        .collect();
    if chain.is_empty() {
        return Err(AgentError::NoModelConfigured(role));
    }
    Ok(chain)
}

/// Call the chain in JSON mode: instruct the model to emit JSON only, then
/// parse the response as `T`. On a parse failure, make exactly one more
/// attempt with an error-correction message appended to the conversation
/// (spec §4.1: "schema validation failure is a retryable error (up to once
/// within the same model — intended to catch the rare malformed-JSON
/// response)"; here applied once across the whole chain, since the chain
/// itself already embodies per-model retry/fallback).
pub async fn call_json<T: DeserializeOwned>(
    chain: &[ModelEntry],
    mut messages: Vec<Message>,
    temperature: f32,
    max_tokens: usize,
) -> Result<T> {
    let request = ChatRequest::new(messages.clone())
        .with_temperature(temperature)
        .with_max_tokens(max_tokens);
    let outcome = call_with_fallback(chain, request).await?;
    let text = outcome.response.message.text().unwrap_or_default().to_string();

    match parse_json_response(&text) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            tracing::warn!(error = %first_error, "malformed JSON response, retrying once with correction prompt");
            messages.push(Message::assistant(text));
            messages.push(Message::human(format!(
                "Your previous response was not valid JSON matching the requested schema: {first_error}. \
                 Respond again with JSON only, no prose, no markdown fences."
            )));
            let retry_request = ChatRequest::new(messages)
                .with_temperature(temperature)
                .with_max_tokens(max_tokens);
            let retry_outcome = call_with_fallback(chain, retry_request).await?;
            let retry_text = retry_outcome.response.message.text().unwrap_or_default().to_string();
            parse_json_response(&retry_text)
                .map_err(|e| AgentError::MalformedResponse(format!("after correction retry: {e}")))
        }
    }
}

/// Models sometimes wrap JSON in markdown code fences despite instructions
/// not to; strip those before parsing.
fn parse_json_response<T: DeserializeOwned>(text: &str) -> std::result::Result<T, String> {
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
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn strips_markdown_fences_before_parsing() {
        let text = "```json\n{\"x\": 1, \"y\": 2}\n```";
        let point: Point = parse_json_response(text).unwrap();
        assert_eq!(point.x, 1);
        assert_eq!(point.y, 2);
    }

    #[test]
    fn parses_bare_json() {
        let point: Point = parse_json_response("{\"x\": 3, \"y\": 4}").unwrap();
        assert_eq!(point.x, 3);
    }
}

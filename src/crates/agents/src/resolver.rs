//! Maps a model identifier string (as named in an `llm::ModelSpec` fallback
//! chain) to the constructed `ChatModel` that actually serves it.
//!
//! Grounded on the redesign flag in spec §9 ("global mutable LLM client
//! singletons ... replace with a constructed LLM provider passed by the
//! orchestrator to each agent"): the orchestrator builds one resolver at
//! startup from its vendor client configuration and hands the same `Arc`
//! to every agent and every run, so no module-level client state leaks
//! across tests or processes.

use llm::ChatModel;
use std::collections::HashMap;
use std::sync::Arc;

pub trait ModelResolver: Send + Sync {
    fn resolve(&self, model_id: &str) -> Option<Arc<dyn ChatModel>>;
}

/// A resolver backed by a fixed, constructed-at-startup map from model id
/// to client. This is the shape the orchestrator binary wires at startup;
/// tests build the same map with stub `ChatModel`s.
#[derive(Clone, Default)]
pub struct StaticModelResolver {
    models: HashMap<String, Arc<dyn ChatModel>>,
}

impl StaticModelResolver {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    pub fn with_model(mut self, id: impl Into<String>, model: Arc<dyn ChatModel>) -> Self {
        self.models.insert(id.into(), model);
        self
    }
}

impl ModelResolver for StaticModelResolver {
    fn resolve(&self, model_id: &str) -> Option<Arc<dyn ChatModel>> {
        self.models.get(model_id).cloned()
    }
}

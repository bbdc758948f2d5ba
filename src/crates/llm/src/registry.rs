//! Per-agent model selection (spec §4.1 "Per-agent model selection").
//!
//! A static mapping from agent role to `{primary, fallback, default_temperature,
//! default_max_tokens}` is the single source of truth for which models an
//! agent's calls go through. Overrides are read once at startup from
//! environment variables named `LLM_AGENTS_<ROLE>_PRIMARY`,
//! `LLM_AGENTS_<ROLE>_FALLBACK` (comma-separated), `_TEMPERATURE`, `_MAX_TOKENS`
//! — mirroring the `llm.agents.<role>.*` config keys the external config
//! loader is responsible for mapping onto the environment (spec §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The three LLM-backed pipeline roles (spec glossary: "Agent").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Generator,
    Validator,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Generator => "generator",
            AgentRole::Validator => "validator",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            AgentRole::Planner => "LLM_AGENTS_PLANNER",
            AgentRole::Generator => "LLM_AGENTS_GENERATOR",
            AgentRole::Validator => "LLM_AGENTS_VALIDATOR",
        }
    }
}

/// The ordered fallback chain and default generation parameters for one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub primary: String,
    pub fallback: Vec<String>,
    pub default_temperature: f32,
    pub default_max_tokens: usize,
}

impl ModelSpec {
    pub fn new(primary: impl Into<String>, fallback: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback,
            default_temperature: 0.2,
            default_max_tokens: 4096,
        }
    }

    /// The full ordered chain of model identifiers to attempt (spec §4.1
    /// "call with fallback": `[primary, fallback1, fallback2, ...]`).
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.primary.clone()];
        chain.extend(self.fallback.iter().cloned());
        chain
    }
}

/// The static role → model-spec mapping, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct AgentModelRegistry {
    specs: HashMap<AgentRole, ModelSpec>,
}

impl AgentModelRegistry {
    pub fn new() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    pub fn with_spec(mut self, role: AgentRole, spec: ModelSpec) -> Self {
        self.specs.insert(role, spec);
        self
    }

    pub fn spec(&self, role: AgentRole) -> Option<&ModelSpec> {
        self.specs.get(&role)
    }

    /// Build the registry from environment overrides on top of the given
    /// defaults. Only variables that are actually set override their
    /// corresponding default field, per spec §4.1: "Environment overrides are
    /// read once at startup."
    pub fn from_env_with_defaults(defaults: HashMap<AgentRole, ModelSpec>) -> Self {
        let mut specs = HashMap::new();
        for (role, mut spec) in defaults {
            let prefix = role.env_prefix();
            if let Ok(primary) = std::env::var(format!("{prefix}_PRIMARY")) {
                spec.primary = primary;
            }
            if let Ok(fallback) = std::env::var(format!("{prefix}_FALLBACK")) {
                spec.fallback = fallback
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            if let Ok(temp) = std::env::var(format!("{prefix}_TEMPERATURE")) {
                if let Ok(parsed) = temp.parse::<f32>() {
                    spec.default_temperature = parsed;
                }
            }
            if let Ok(tokens) = std::env::var(format!("{prefix}_MAX_TOKENS")) {
                if let Ok(parsed) = tokens.parse::<usize>() {
                    spec.default_max_tokens = parsed;
                }
            }
            specs.insert(role, spec);
        }
        Self { specs }
    }
}

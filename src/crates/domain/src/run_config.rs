//! Per-run tunables threaded through `orchestrator::run` (spec §6
//! Configuration). Not part of the distilled spec's `RunState`, but every
//! one of those configuration keys needs somewhere to live once a run is
//! actually in flight — this is that value object.

use crate::run_state::DEFAULT_MAX_ITERATIONS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-agent-role overrides of the model chain/generation parameters
/// otherwise supplied by `llm::AgentModelRegistry`'s defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOverride {
    pub primary: Option<String>,
    pub fallback: Option<Vec<String>>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// Per-agent-role timeout (spec §6 `orchestrator.agent_timeout_seconds`:
/// 30s for Planner/Validator, 60s for Generator, by default).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentTimeouts {
    pub planner_seconds: u64,
    pub generator_seconds: u64,
    pub validator_seconds: u64,
}

impl Default for AgentTimeouts {
    fn default() -> Self {
        Self {
            planner_seconds: 30,
            generator_seconds: 60,
            validator_seconds: 30,
        }
    }
}

/// Tunables for one run of the pipeline, carrying every configuration key
/// named in spec §6 that varies per call to `orchestrator::run` rather
/// than being a process-wide constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_iterations: u32,
    pub sandbox_timeout_seconds: u64,
    pub cad_timeout_seconds: u64,
    pub agent_timeouts: AgentTimeouts,
    #[serde(default)]
    pub model_overrides: HashMap<String, ModelOverride>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            sandbox_timeout_seconds: 60,
            cad_timeout_seconds: 60,
            agent_timeouts: AgentTimeouts::default(),
            model_overrides: HashMap::new(),
        }
    }
}

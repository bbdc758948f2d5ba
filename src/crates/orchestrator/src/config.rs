//! Startup configuration (spec §6): read once from a named config file plus
//! environment variable overrides. Provider API keys are environment-only —
//! `load` raises `ConfigError::ApiKeyInFile` if the file itself contains an
//! `api_key`-shaped field, before any of it is deserialized into typed
//! config.

use domain::{AgentTimeouts, RunConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error(
        "config file {path} contains a field named {field:?} — provider API keys must come \
         only from environment variables, never from a file on disk (spec §6)"
    )]
    ApiKeyInFile { path: PathBuf, field: String },

    #[error("invalid environment variable {key}: {message}")]
    Env { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Memory,
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub freecad_engine_path: PathBuf,
    pub freecad_headless_flag: String,
    pub sandbox_execution_timeout_seconds: u64,
    pub sandbox_concurrent_limit: usize,
    pub run_config: RunConfig,
    pub store_backend: StoreBackend,
    pub run_ttl_seconds: i64,
    pub stale_threshold_seconds: i64,
    pub scratch_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub bind_addr: String,
}

/// Raw, file-deserializable shape. Deliberately has no `api_key` field of
/// its own — those are read straight from the environment in the binary,
/// never routed through this struct.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    freecad: FreecadSection,
    sandbox: SandboxSection,
    orchestrator: OrchestratorSection,
    store: StoreSection,
    scratch_dir: Option<String>,
    outputs_dir: Option<String>,
    bind_addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FreecadSection {
    engine_path: Option<String>,
    headless_flag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SandboxSection {
    execution_timeout_seconds: Option<u64>,
    concurrent_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrchestratorSection {
    max_iterations: Option<u32>,
    agent_timeout_seconds_planner: Option<u64>,
    agent_timeout_seconds_generator: Option<u64>,
    agent_timeout_seconds_validator: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoreSection {
    run_ttl_seconds: Option<i64>,
    stale_threshold_seconds: Option<i64>,
    sqlite_path: Option<String>,
}

impl OrchestratorConfig {
    /// Loads defaults, overlays an optional TOML file (rejecting any
    /// `api_key`-shaped field found in it), then overlays environment
    /// variables, matching the precedence implied by spec §6's "read once
    /// at startup from a named config file and environment variables."
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Some(read_file_config(path)?),
            None => None,
        }
        .unwrap_or_default();

        let mut config = Self::defaults();
        config.apply_file(file);
        config.apply_env()?;
        Ok(config)
    }

    fn defaults() -> Self {
        Self {
            freecad_engine_path: PathBuf::from("/usr/bin/freecadcmd"),
            freecad_headless_flag: "--headless".to_string(),
            sandbox_execution_timeout_seconds: 60,
            sandbox_concurrent_limit: cad_runner::DEFAULT_CONCURRENT_LIMIT,
            run_config: RunConfig::default(),
            store_backend: StoreBackend::Memory,
            run_ttl_seconds: run_store::DEFAULT_RUN_TTL_SECONDS,
            stale_threshold_seconds: run_store::DEFAULT_STALE_THRESHOLD_SECONDS,
            scratch_dir: PathBuf::from("./var/scratch"),
            outputs_dir: PathBuf::from("./var/outputs"),
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.freecad.engine_path {
            self.freecad_engine_path = PathBuf::from(v);
        }
        if let Some(v) = file.freecad.headless_flag {
            self.freecad_headless_flag = v;
        }
        if let Some(v) = file.sandbox.execution_timeout_seconds {
            self.sandbox_execution_timeout_seconds = v;
        }
        if let Some(v) = file.sandbox.concurrent_limit {
            self.sandbox_concurrent_limit = v;
        }
        if let Some(v) = file.orchestrator.max_iterations {
            self.run_config.max_iterations = v;
        }
        let timeouts = &mut self.run_config.agent_timeouts;
        if let Some(v) = file.orchestrator.agent_timeout_seconds_planner {
            timeouts.planner_seconds = v;
        }
        if let Some(v) = file.orchestrator.agent_timeout_seconds_generator {
            timeouts.generator_seconds = v;
        }
        if let Some(v) = file.orchestrator.agent_timeout_seconds_validator {
            timeouts.validator_seconds = v;
        }
        if let Some(v) = file.store.run_ttl_seconds {
            self.run_ttl_seconds = v;
        }
        if let Some(v) = file.store.stale_threshold_seconds {
            self.stale_threshold_seconds = v;
        }
        if let Some(v) = file.store.sqlite_path {
            self.store_backend = StoreBackend::Sqlite { path: PathBuf::from(v) };
        }
        if let Some(v) = file.scratch_dir {
            self.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = file.outputs_dir {
            self.outputs_dir = PathBuf::from(v);
        }
        if let Some(v) = file.bind_addr {
            self.bind_addr = v;
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_string("FREECAD_ENGINE_PATH")? {
            self.freecad_engine_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("FREECAD_HEADLESS_FLAG")? {
            self.freecad_headless_flag = v;
        }
        if let Some(v) = env_parse::<u64>("SANDBOX_EXECUTION_TIMEOUT_SECONDS")? {
            self.sandbox_execution_timeout_seconds = v;
        }
        if let Some(v) = env_parse::<usize>("SANDBOX_CONCURRENT_LIMIT")? {
            self.sandbox_concurrent_limit = v;
        }
        if let Some(v) = env_parse::<u32>("ORCHESTRATOR_MAX_ITERATIONS")? {
            self.run_config.max_iterations = v;
        }
        if let Some(v) = env_parse::<u64>("ORCHESTRATOR_AGENT_TIMEOUT_SECONDS_PLANNER")? {
            self.run_config.agent_timeouts.planner_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("ORCHESTRATOR_AGENT_TIMEOUT_SECONDS_GENERATOR")? {
            self.run_config.agent_timeouts.generator_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("ORCHESTRATOR_AGENT_TIMEOUT_SECONDS_VALIDATOR")? {
            self.run_config.agent_timeouts.validator_seconds = v;
        }
        if let Some(v) = env_parse::<i64>("STORE_RUN_TTL_SECONDS")? {
            self.run_ttl_seconds = v;
        }
        if let Some(v) = env_parse::<i64>("STORE_STALE_THRESHOLD_SECONDS")? {
            self.stale_threshold_seconds = v;
        }
        if let Some(v) = env_string("STORE_SQLITE_PATH")? {
            self.store_backend = StoreBackend::Sqlite { path: PathBuf::from(v) };
        }
        if let Some(v) = env_string("SCRATCH_DIR")? {
            self.scratch_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("OUTPUTS_DIR")? {
            self.outputs_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("BIND_ADDR")? {
            self.bind_addr = v;
        }
        Ok(())
    }

    pub fn default_timeouts(&self) -> AgentTimeouts {
        self.run_config.agent_timeouts
    }
}

fn env_string(key: &str) -> Result<Option<String>> {
    tooling::config::get_env(key).map_err(|e| ConfigError::Env {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    tooling::config::get_env_parse(key).map_err(|e| ConfigError::Env {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let raw: toml::Value = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Some(field) = find_api_key_field(&raw, "") {
        return Err(ConfigError::ApiKeyInFile {
            path: path.to_path_buf(),
            field,
        });
    }

    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Recursively scans a parsed config document for any key whose name looks
/// like it holds a secret (spec §6: "the config loader must raise an error
/// if an API key is found in a file").
fn find_api_key_field(value: &toml::Value, path: &str) -> Option<String> {
    let table = value.as_table()?;
    for (key, nested) in table {
        let full_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
        if key.to_lowercase().contains("api_key") {
            return Some(full_path);
        }
        if let Some(found) = find_api_key_field(nested, &full_path) {
            return Some(found);
        }
    }
    None
}

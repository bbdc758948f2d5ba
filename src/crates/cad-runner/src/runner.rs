//! Headless CAD engine driver (spec §4.3): semaphore-bounded script
//! execution with a single retry on transient topological-naming errors.

use crate::error::{Result, RunnerError};
use domain::{ExecutionResult, ObjectSummary};
use sandbox::{SandboxConfig, StateExtractor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const DEFAULT_CONCURRENT_LIMIT: usize = 4;

/// Substring FreeCAD emits on transient recompute errors caused by feature
/// names shifting between runs of the same document — retried once with a
/// fresh working directory (spec §4.3 "Retry policy on recompute errors").
const TRANSIENT_RECOMPUTE_MARKER: &str = "topological naming";

fn is_transient_recompute_error(result: &ExecutionResult) -> bool {
    result.errors.iter().any(|e| {
        let in_message = e.message.to_lowercase().contains(TRANSIENT_RECOMPUTE_MARKER);
        let in_trace = e
            .trace
            .as_deref()
            .map(|t| t.to_lowercase().contains(TRANSIENT_RECOMPUTE_MARKER))
            .unwrap_or(false);
        in_message || in_trace
    })
}

/// Drives the CAD engine subprocess: bounds concurrency with a process-wide
/// semaphore, retries once on transient recompute failures, and serves as
/// the `StateExtractor` the sandbox calls back into after a successful run.
pub struct CadRunner {
    sandbox_config: SandboxConfig,
    scratch_dir: PathBuf,
    semaphore: Arc<Semaphore>,
}

impl CadRunner {
    pub fn new(sandbox_config: SandboxConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self::with_concurrency_limit(sandbox_config, scratch_dir, DEFAULT_CONCURRENT_LIMIT)
    }

    pub fn with_concurrency_limit(
        sandbox_config: SandboxConfig,
        scratch_dir: impl Into<PathBuf>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            sandbox_config,
            scratch_dir: scratch_dir.into(),
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Run `script_path` with a concurrency-bounded, timeout-capped,
    /// single-retry-on-transient-error execution (spec §4.3).
    pub async fn run_script(&self, script_path: &Path, timeout_seconds: u64) -> ExecutionResult {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed while the runner is alive");

        let script_text = match tokio::fs::read_to_string(script_path).await {
            Ok(text) => text,
            Err(e) => return ExecutionResult::failure(format!("failed to read script: {e}")),
        };

        let first = self.run_once(&script_text, timeout_seconds).await;
        if first.success || !is_transient_recompute_error(&first) {
            return first;
        }
        tracing::debug!("retrying script after transient recompute error with fresh working directory");
        self.run_once(&script_text, timeout_seconds).await
    }

    async fn run_once(&self, script_text: &str, timeout_seconds: u64) -> ExecutionResult {
        let run_id = uuid::Uuid::new_v4().to_string();
        let working_dir = match sandbox::prepare_working_dir(&self.scratch_dir, &run_id) {
            Ok(dir) => dir,
            Err(e) => return ExecutionResult::failure(e.to_string()),
        };
        sandbox::execute(
            &self.sandbox_config,
            script_text,
            &working_dir,
            timeout_seconds,
            Some(self),
        )
        .await
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn sandbox_config(&self) -> &SandboxConfig {
        &self.sandbox_config
    }
}

impl StateExtractor for CadRunner {
    fn extract(&self, document_path: &Path) -> std::result::Result<Vec<ObjectSummary>, String> {
        crate::extraction::extract_state(document_path)
    }
}

/// Stage `script_text` into the scratch directory as a runnable script file,
/// for callers (e.g. the orchestrator, between Generator and `run_script`)
/// that hold script text rather than an on-disk path.
pub async fn stage_script(scratch_dir: &Path, run_id: &str, script_text: &str) -> Result<PathBuf> {
    let dir = sandbox::prepare_working_dir(scratch_dir, run_id).map_err(|e| RunnerError::ScratchDir(e.to_string()))?;
    let path = dir.join("script.py");
    tokio::fs::write(&path, script_text)
        .await
        .map_err(|e| RunnerError::ReadScript(e.to_string()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::RuntimeError;
    use tempfile::tempdir;

    fn echo_config() -> SandboxConfig {
        SandboxConfig::new("/bin/echo", "--headless")
    }

    #[tokio::test]
    async fn runs_a_script_file_successfully() {
        let scratch = tempdir().unwrap();
        let runner = CadRunner::new(echo_config(), scratch.path());
        let script_path = stage_script(scratch.path(), "run-1", "import Part\n").await.unwrap();

        let result = runner.run_script(&script_path, 5).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn missing_script_file_fails_without_panicking() {
        let scratch = tempdir().unwrap();
        let runner = CadRunner::new(echo_config(), scratch.path());
        let result = runner.run_script(Path::new("/nonexistent/script.py"), 5).await;
        assert!(!result.success);
    }

    #[test]
    fn detects_transient_recompute_error_by_marker() {
        let mut result = ExecutionResult::failure("placeholder");
        result.errors = vec![RuntimeError {
            message: "recompute failed".to_string(),
            trace: Some("Topological Naming issue on Box001".to_string()),
        }];
        assert!(is_transient_recompute_error(&result));
    }

    #[test]
    fn does_not_flag_unrelated_errors_as_transient() {
        let mut result = ExecutionResult::failure("placeholder");
        result.errors = vec![RuntimeError {
            message: "syntax error".to_string(),
            trace: None,
        }];
        assert!(!is_transient_recompute_error(&result));
    }

    #[tokio::test]
    async fn concurrency_limit_serializes_beyond_the_bound() {
        let scratch = tempdir().unwrap();
        let runner = Arc::new(CadRunner::with_concurrency_limit(echo_config(), scratch.path(), 1));
        let script_path = stage_script(scratch.path(), "run-shared", "import Part\n")
            .await
            .unwrap();

        let r1 = runner.clone();
        let p1 = script_path.clone();
        let r2 = runner.clone();
        let p2 = script_path.clone();

        let (a, b) = tokio::join!(
            tokio::spawn(async move { r1.run_script(&p1, 5).await }),
            tokio::spawn(async move { r2.run_script(&p2, 5).await }),
        );
        assert!(a.unwrap().success);
        assert!(b.unwrap().success);
    }
}

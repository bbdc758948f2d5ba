//! Isolated subprocess execution of validated scripts (spec §4.2).
//!
//! Grounded on the spawn/timeout shape of a generic bash-execution tool:
//! launch in a fresh subprocess, enforce a timeout by racing the child's
//! `output()` future against a deadline, and report every failure mode
//! in-band rather than raising. The child is spawned with `kill_on_drop`,
//! so losing the race kills the CAD engine rather than orphaning it.

use crate::validator::validate;
use domain::{ExecutionResult, ObjectSummary, RuntimeError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment variables propagated to the CAD subprocess; everything else
/// is stripped (spec §4.2 "minimal whitelist").
const ENV_WHITELIST: &[&str] = &["PATH", "FREECAD_USER_HOME", "LD_LIBRARY_PATH"];

/// Extracts `created_objects` from a CAD document produced by a script run.
/// Implemented by the CAD headless runner crate; kept as a trait here so the
/// sandbox does not depend on it (spec §4.2 "post-run extraction").
pub trait StateExtractor: Send + Sync {
    fn extract(&self, document_path: &Path) -> std::result::Result<Vec<ObjectSummary>, String>;
}

/// Where to find the CAD engine and how to invoke it headlessly (spec §6
/// `freecad.engine_path` / `freecad.headless_flag`).
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub engine_path: PathBuf,
    pub headless_flag: String,
    pub document_extension: String,
}

impl SandboxConfig {
    pub fn new(engine_path: impl Into<PathBuf>, headless_flag: impl Into<String>) -> Self {
        Self {
            engine_path: engine_path.into(),
            headless_flag: headless_flag.into(),
            document_extension: "FCStd".to_string(),
        }
    }
}

/// Create a fresh, empty working directory for one execution under `base`
/// (spec §4.2 "caller-supplied temporary path"). Named by `run_id` so
/// concurrent runs never collide.
pub fn prepare_working_dir(base: &Path, run_id: &str) -> crate::error::Result<PathBuf> {
    let dir = base.join(run_id);
    std::fs::create_dir_all(&dir)
        .map_err(|e| crate::error::SandboxError::WorkingDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

fn scoped_env() -> Vec<(String, String)> {
    ENV_WHITELIST
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect()
}

/// Find the newest CAD document file the script produced in `working_dir`,
/// if any.
fn find_document(working_dir: &Path, extension: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(working_dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .max_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        })
}

/// Validate then run `script_text` in `working_dir`, capped at
/// `timeout_seconds`. Never panics or returns `Err` for a script failure —
/// every outcome is carried in the returned `ExecutionResult` (spec §4.2
/// "the sandbox never raises").
pub async fn execute(
    config: &SandboxConfig,
    script_text: &str,
    working_dir: &Path,
    timeout_seconds: u64,
    extractor: Option<&dyn StateExtractor>,
) -> ExecutionResult {
    let outcome = validate(script_text);
    if !outcome.ok {
        return ExecutionResult::failure(outcome.reasons.join("; "));
    }

    let script_path = working_dir.join("script.py");
    if let Err(e) = write_script(&script_path, script_text).await {
        return ExecutionResult::failure(format!("failed to stage script: {e}"));
    }

    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_seconds);

    let spawn_result =
        tooling::async_utils::timeout::with_timeout(timeout, run_child(config, &script_path, working_dir)).await;

    let duration_ms = start.elapsed().as_millis() as u64;

    let (stdout, stderr, exit_code) = match spawn_result {
        Ok(output) => (
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            output.status.code().unwrap_or(-1),
        ),
        Err(tooling::async_utils::timeout::TimeoutError::OperationFailed(e)) => {
            let mut result = ExecutionResult::failure(format!("failed to spawn CAD engine: {e}"));
            result.duration_ms = duration_ms;
            return result;
        }
        Err(tooling::async_utils::timeout::TimeoutError::Timeout(_)) => {
            let mut result = ExecutionResult::failure("timeout");
            result.duration_ms = duration_ms;
            return result;
        }
    };

    let mut errors = Vec::new();
    if exit_code != 0 {
        errors.push(RuntimeError {
            message: format!("CAD engine exited with status {exit_code}"),
            trace: Some(stderr.clone()),
        });
    }

    let mut created_objects = Vec::new();
    if exit_code == 0 {
        if let Some(document) = find_document(working_dir, &config.document_extension) {
            if let Some(extractor) = extractor {
                match extractor.extract(&document) {
                    Ok(objects) => created_objects = objects,
                    Err(e) => errors.push(RuntimeError {
                        message: format!("state extraction failed: {e}"),
                        trace: None,
                    }),
                }
            }
        }
    }

    ExecutionResult {
        success: exit_code == 0 && errors.is_empty(),
        stdout,
        stderr,
        exit_code,
        created_objects,
        errors,
        artifact_paths: Vec::new(),
        duration_ms,
    }
}

async fn write_script(path: &Path, script_text: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(script_text.as_bytes()).await?;
    file.flush().await
}

async fn run_child(
    config: &SandboxConfig,
    script_path: &Path,
    working_dir: &Path,
) -> std::io::Result<std::process::Output> {
    Command::new(&config.engine_path)
        .arg(&config.headless_flag)
        .arg(script_path)
        .current_dir(working_dir)
        .env_clear()
        .envs(scoped_env())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FixedExtractor(Vec<ObjectSummary>);
    impl StateExtractor for FixedExtractor {
        fn extract(&self, _document_path: &Path) -> std::result::Result<Vec<ObjectSummary>, String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn prepare_working_dir_creates_a_fresh_directory_per_run() {
        let base = tempdir().unwrap();
        let dir = prepare_working_dir(base.path(), "run-1").unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, base.path().join("run-1"));
    }

    fn echo_config() -> SandboxConfig {
        // /bin/echo ignores unknown flags/args and always exits 0; stands in
        // for the CAD engine binary without depending on FreeCAD being
        // installed in the test environment.
        SandboxConfig::new("/bin/echo", "--headless")
    }

    #[tokio::test]
    async fn rejects_before_execution_on_validation_failure() {
        let dir = tempdir().unwrap();
        let config = echo_config();
        let result = execute(&config, "import os\nos.system('x')\n", dir.path(), 5, None).await;
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
        assert!(result.errors[0].message.contains("os"));
    }

    #[tokio::test]
    async fn times_out_on_slow_script() {
        let dir = tempdir().unwrap();
        // A stand-in "engine" that ignores its arguments and sleeps past the
        // timeout, so the test doesn't depend on `sleep`'s argument parsing.
        let engine_path = dir.path().join("slow_engine.sh");
        std::fs::write(&engine_path, "#!/bin/sh\nsleep 5\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&engine_path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&engine_path, perms).unwrap();
        }
        let config = SandboxConfig::new(engine_path, "--headless");
        let result = execute(&config, "import Part\n", dir.path(), 1, None).await;
        assert!(!result.success);
        assert!(result.errors[0].message.contains("timeout"));
    }

    #[tokio::test]
    async fn runs_valid_script_and_captures_output() {
        let dir = tempdir().unwrap();
        let config = echo_config();
        let result = execute(&config, "import Part\nbox = Part.makeBox(1, 1, 1)\n", dir.path(), 5, None).await;
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn extracts_created_objects_when_document_present() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("n1_box.FCStd"), b"stub").unwrap();
        let config = echo_config();
        let objects = vec![ObjectSummary {
            name: "n1_box".to_string(),
            object_type: "Part::Box".to_string(),
            bounding_box: domain::BoundingBox {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 1.0, 1.0],
            },
            volume: 1.0,
            face_count: 6,
            parent_ids: Vec::new(),
        }];
        let extractor = FixedExtractor(objects);
        let result = execute(&config, "import Part\n", dir.path(), 5, Some(&extractor)).await;
        assert!(result.success);
        assert_eq!(result.created_objects.len(), 1);
        assert_eq!(result.created_objects[0].name, "n1_box");
    }
}

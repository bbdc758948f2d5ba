//! Export manifest sidecar (spec §6 "Exported artifact formats"): every
//! exported artifact is paired with a JSON sidecar carrying the run id,
//! a hash of the originating prompt, an export timestamp, and the task
//! graph that produced the document — enough to trace an exported file
//! back to the run without reopening the run state store.

use domain::TaskGraph;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    pub run_id: Uuid,
    pub prompt_hash: String,
    pub exported_at: chrono::DateTime<chrono::Utc>,
    pub task_graph: TaskGraph,
}

/// Hex-encoded SHA-256 of the user prompt, so the manifest never carries the
/// prompt text itself (it may be long or contain sensitive design details).
pub fn hash_prompt(user_prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The sidecar path a given exported artifact's manifest is written to,
/// alongside `extraction::sidecar_path`'s `.state.json` convention.
pub fn manifest_path(artifact_path: &Path) -> PathBuf {
    let mut path = artifact_path.to_path_buf();
    let stem = artifact_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    path.set_file_name(format!("{stem}.manifest.json"));
    path
}

pub async fn write_manifest(
    artifact_path: &Path,
    run_id: Uuid,
    user_prompt: &str,
    task_graph: &TaskGraph,
) -> std::io::Result<PathBuf> {
    let manifest = ExportManifest {
        run_id,
        prompt_hash: hash_prompt(user_prompt),
        exported_at: chrono::Utc::now(),
        task_graph: task_graph.clone(),
    };
    let path = manifest_path(artifact_path);
    let body = serde_json::to_string_pretty(&manifest)
        .expect("ExportManifest always serializes: all fields are plain data");
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::TaskNode;

    #[test]
    fn same_prompt_hashes_the_same_way() {
        assert_eq!(hash_prompt("a box 10mm wide"), hash_prompt("a box 10mm wide"));
    }

    #[test]
    fn different_prompts_hash_differently() {
        assert_ne!(hash_prompt("a box"), hash_prompt("a cylinder"));
    }

    #[test]
    fn manifest_path_sits_next_to_the_artifact() {
        let artifact = Path::new("/tmp/run-1/part.step");
        assert_eq!(manifest_path(artifact), Path::new("/tmp/run-1/part.manifest.json"));
    }

    #[tokio::test]
    async fn writes_a_readable_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("part.stl");
        let run_id = Uuid::new_v4();
        let graph = TaskGraph::new(vec![TaskNode::new("n1", "create_sketch")]);

        let path = write_manifest(&artifact, run_id, "a box", &graph).await.unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        let parsed: ExportManifest = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.run_id, run_id);
        assert_eq!(parsed.task_graph.nodes.len(), 1);
    }
}

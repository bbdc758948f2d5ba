//! State extraction (spec §4.3): reads the post-run CAD document's object
//! summary.
//!
//! Extraction must run in the *same* subprocess as execution, so the actual
//! walk of the feature tree happens inside the CAD engine's own interpreter
//! — the Generator's script template ends with a call into the engine's
//! scripting API that serializes every created object (name, type, bounding
//! box, volume, face count, parent/child relations) to a JSON sidecar next
//! to the document before the process exits. This module's job is just to
//! read that sidecar back; it never reopens the document itself.

use domain::ObjectSummary;
use std::path::{Path, PathBuf};

/// The sidecar path a given CAD document's extraction state is written to.
pub fn sidecar_path(document_path: &Path) -> PathBuf {
    let mut path = document_path.to_path_buf();
    let stem = document_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    path.set_file_name(format!("{stem}.state.json"));
    path
}

/// Read the `created_objects` summary written by the same subprocess run
/// that produced `document_path`.
pub fn extract_state(document_path: &Path) -> std::result::Result<Vec<ObjectSummary>, String> {
    let sidecar = sidecar_path(document_path);
    let contents = std::fs::read_to_string(&sidecar)
        .map_err(|e| format!("missing state sidecar {}: {e}", sidecar.display()))?;
    serde_json::from_str(&contents).map_err(|e| format!("malformed state sidecar: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::BoundingBox;
    use tempfile::tempdir;

    #[test]
    fn sidecar_path_sits_next_to_the_document() {
        let document = Path::new("/tmp/run-1/part.FCStd");
        assert_eq!(sidecar_path(document), Path::new("/tmp/run-1/part.state.json"));
    }

    #[test]
    fn reads_objects_written_by_the_executing_subprocess() {
        let dir = tempdir().unwrap();
        let document = dir.path().join("part.FCStd");
        let objects = vec![ObjectSummary {
            name: "n1_box".to_string(),
            object_type: "Part::Box".to_string(),
            bounding_box: BoundingBox {
                min: [0.0, 0.0, 0.0],
                max: [1.0, 1.0, 1.0],
            },
            volume: 1.0,
            face_count: 6,
            parent_ids: Vec::new(),
        }];
        std::fs::write(sidecar_path(&document), serde_json::to_string(&objects).unwrap()).unwrap();

        let extracted = extract_state(&document).unwrap();
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].name, "n1_box");
    }

    #[test]
    fn missing_sidecar_is_reported_as_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let document = dir.path().join("part.FCStd");
        assert!(extract_state(&document).is_err());
    }
}

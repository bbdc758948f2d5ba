//! Output of the sandbox/CAD runner (spec §3, §4.2, §4.3).

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box corner pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }
}

/// Summary of one CAD object created during script execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub name: String,
    pub object_type: String,
    pub bounding_box: BoundingBox,
    pub volume: f64,
    pub face_count: u32,
    /// Parent/child relations in the CAD document's feature tree, by object name.
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

impl ObjectSummary {
    /// Generator names objects `<node_id>_...` so the Validator's semantic
    /// check (spec §4.7 step 2) can attribute objects back to task nodes.
    pub fn originating_node_id(&self) -> Option<&str> {
        self.name.split('_').next()
    }
}

/// A structured runtime error surfaced from script execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeError {
    pub message: String,
    pub trace: Option<String>,
}

/// Output of `Sandbox::execute` / `CadRunner::run_script`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub created_objects: Vec<ObjectSummary>,
    pub errors: Vec<RuntimeError>,
    pub artifact_paths: Vec<String>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// A canned failure result; the sandbox never raises — every failure
    /// mode (validation rejection, timeout, non-zero exit, extraction
    /// failure) is reported in-band via this constructor (spec §4.2).
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: -1,
            created_objects: Vec::new(),
            errors: vec![RuntimeError {
                message: reason.into(),
                trace: None,
            }],
            artifact_paths: Vec::new(),
            duration_ms: 0,
        }
    }
}

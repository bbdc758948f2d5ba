//! The text blob produced by the Generator agent (spec §3).

use serde::{Deserialize, Serialize};

/// A generated script plus the metadata needed to trace it back to its
/// producing task node and know whether it has passed static validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub source_text: String,
    pub generated_by_node_id: String,
    pub ast_check_passed: bool,
}

impl Script {
    pub fn new(source_text: impl Into<String>, generated_by_node_id: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            generated_by_node_id: generated_by_node_id.into(),
            ast_check_passed: false,
        }
    }
}

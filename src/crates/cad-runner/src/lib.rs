//! The headless CAD engine driver (spec §4.3): runs generated scripts
//! against the CAD engine's subprocess, extracts structured object state
//! written by that same subprocess, and exports documents to downstream
//! formats.

pub mod error;
pub mod export;
pub mod extraction;
pub mod manifest;
pub mod runner;

pub use error::{Result, RunnerError};
pub use export::{export, ExportFormat};
pub use extraction::{extract_state, sidecar_path};
pub use manifest::{manifest_path, write_manifest, ExportManifest};
pub use runner::{stage_script, CadRunner, DEFAULT_CONCURRENT_LIMIT};

//! Artifact export (spec §4.3, §6): convert a CAD document to one of the
//! exported formats and copy the result to the caller's destination.

use crate::error::{Result, RunnerError};
use sandbox::SandboxConfig;
use std::path::{Path, PathBuf};

/// Exported artifact formats (spec §6 "Exported artifact formats").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Native,
    Step,
    Stl,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Native => "FCStd",
            ExportFormat::Step => "step",
            ExportFormat::Stl => "stl",
        }
    }
}

fn conversion_script(document_path: &Path, destination: &Path, format: ExportFormat) -> String {
    match format {
        ExportFormat::Native => String::new(),
        ExportFormat::Step | ExportFormat::Stl => format!(
            "import FreeCAD\nimport Part\ndoc = FreeCAD.openDocument(r\"{}\")\nPart.export(doc.Objects, r\"{}\")\n",
            document_path.display(),
            destination.display(),
        ),
    }
}

/// Convert `document_path` to `format` and place the result at
/// `destination`. Native export is a plain copy; STEP/STL route through a
/// short conversion script run against the CAD engine, reusing the
/// sandbox's subprocess-with-timeout executor since the script is
/// fixed and trusted rather than model-generated.
pub async fn export(
    config: &SandboxConfig,
    document_path: &Path,
    format: ExportFormat,
    destination: &Path,
    scratch_dir: &Path,
    timeout_seconds: u64,
) -> Result<PathBuf> {
    if destination
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| !e.eq_ignore_ascii_case(format.extension()))
        .unwrap_or(true)
    {
        return Err(RunnerError::Export(format!(
            "destination {} does not match expected extension .{}",
            destination.display(),
            format.extension()
        )));
    }

    if format == ExportFormat::Native {
        tokio::fs::copy(document_path, destination)
            .await
            .map_err(|e| RunnerError::Export(e.to_string()))?;
        return Ok(destination.to_path_buf());
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let working_dir = sandbox::prepare_working_dir(scratch_dir, &run_id)
        .map_err(|e| RunnerError::ScratchDir(e.to_string()))?;

    let script = conversion_script(document_path, destination, format);
    let result = sandbox::execute(config, &script, &working_dir, timeout_seconds, None).await;

    if !result.success {
        return Err(RunnerError::Export(
            result
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "conversion subprocess failed".to_string()),
        ));
    }

    if !destination.exists() {
        return Err(RunnerError::Export(format!(
            "conversion reported success but {} was not produced",
            destination.display()
        )));
    }

    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn echo_config() -> SandboxConfig {
        SandboxConfig::new("/bin/echo", "--headless")
    }

    #[tokio::test]
    async fn native_export_copies_the_document() {
        let dir = tempdir().unwrap();
        let document = dir.path().join("part.FCStd");
        std::fs::write(&document, b"stub document").unwrap();
        let destination = dir.path().join("out.FCStd");

        let result = export(
            &echo_config(),
            &document,
            ExportFormat::Native,
            &destination,
            dir.path(),
            5,
        )
        .await
        .unwrap();

        assert_eq!(result, destination);
        assert_eq!(std::fs::read(&destination).unwrap(), b"stub document");
    }

    #[tokio::test]
    async fn rejects_destination_with_mismatched_extension() {
        let dir = tempdir().unwrap();
        let document = dir.path().join("part.FCStd");
        std::fs::write(&document, b"stub").unwrap();
        let destination = dir.path().join("out.stl");

        let err = export(
            &echo_config(),
            &document,
            ExportFormat::Native,
            &destination,
            dir.path(),
            5,
        )
        .await
        .unwrap_err();

        matches!(err, RunnerError::Export(_));
    }
}

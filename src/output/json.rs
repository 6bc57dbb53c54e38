// Result Writer: persist a Run Result as pretty-printed JSON.
//
// The artifact is written to a temp file in the destination directory and
// then renamed over the old one, so readers see either the previous run or
// the new one in full, never a half-written file.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::error::RunError;
use crate::models::RunResult;

/// Serialize a result exactly as the artifact stores it.
pub fn to_json(result: &RunResult) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(result)?;
    json.push('\n');
    Ok(json)
}

/// Atomically replace the artifact at `path`.
pub fn write_result(path: &Path, result: &RunResult) -> Result<(), RunError> {
    let write_err = |source: std::io::Error| RunError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let json = to_json(result).map_err(|e| write_err(e.into()))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

/// Load a previously written artifact.
pub fn read_result(path: &Path) -> Result<RunResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

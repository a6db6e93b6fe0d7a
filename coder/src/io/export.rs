//! One-shot JSON dump of agent progress for `export_progress`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::critic::CritiqueReport;
use crate::core::types::{StatusCounts, Task};

/// Critique of one recently touched file.
#[derive(Debug, Clone, Serialize)]
pub struct FileQuality {
    pub path: String,
    pub report: CritiqueReport,
}

/// Snapshot of an agent run, written as pretty JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressExport {
    pub goal: String,
    /// Workspace-relative path of the loaded requirements document.
    pub requirements: Option<String>,
    pub task_counts: StatusCounts,
    pub tasks: Vec<Task>,
    pub touched_files: Vec<String>,
    pub quality: Vec<FileQuality>,
}

/// Serialize `export` to pretty-printed JSON with trailing newline.
///
/// Parent directories are created as needed.
pub fn write_export(path: &Path, export: &ProgressExport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut payload = serde_json::to_string_pretty(export).context("serialize progress export")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

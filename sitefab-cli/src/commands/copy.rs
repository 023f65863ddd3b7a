//! Copy command implementation.

use anyhow::{Context, Result};
use sitefab_core::Pipeline;
use std::path::{Path, PathBuf};

/// Copy each folder's contents into `destination` as-is
pub fn copy_folders(pipeline: &mut Pipeline, folders: &[PathBuf], destination: &Path) -> Result<()> {
    let report = pipeline
        .copy_folders(folders, destination)
        .context("Failed to copy folders")?;
    tracing::info!(
        "Copied {} file(s) into {}",
        report.copied.len(),
        destination.display()
    );
    Ok(())
}

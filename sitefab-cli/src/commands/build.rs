//! Build command implementation.

use anyhow::{Context, Result};
use sitefab_core::{BuildReport, Pipeline};
use std::path::Path;

/// Build every page under `source` into `destination`
pub fn build_folder(pipeline: &mut Pipeline, source: &Path, destination: &Path) -> Result<()> {
    let report = pipeline
        .transform_folder(source, destination)
        .with_context(|| format!("Failed to build {}", source.display()))?;
    log_report(&report, destination);
    Ok(())
}

/// Build a single page into `destination`
pub fn build_file(pipeline: &mut Pipeline, file: &Path, destination: &Path) -> Result<()> {
    let report = pipeline
        .transform_file(file, destination)
        .with_context(|| format!("Failed to build {}", file.display()))?;
    log_report(&report, destination);
    Ok(())
}

fn log_report(report: &BuildReport, destination: &Path) {
    for path in &report.rendered {
        tracing::debug!("Wrote {}", path.display());
    }
    tracing::info!(
        "Built {} page(s) and copied {} file(s) into {}",
        report.rendered.len(),
        report.copied.len(),
        destination.display()
    );
}

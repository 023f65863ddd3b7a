//! Hook script loading.

use sitefab_core::Pipeline;
use std::path::Path;

/// Install every script under `folder`; failures are logged and skipped
pub fn load_scripts(pipeline: &mut Pipeline, folder: &Path) {
    if !folder.is_dir() {
        tracing::warn!("Scripts folder {} does not exist", folder.display());
        return;
    }
    let loaded = pipeline.load_scripts(folder);
    tracing::info!("Loaded {} script(s) from {}", loaded, folder.display());
    if loaded > 0 {
        tracing::debug!("Hooks: {}", pipeline.hook_names().join(", "));
    }
}

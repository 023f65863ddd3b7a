//! Build orchestration connecting every stage.
//!
//! Flow: walk → register partials → per file {model hooks → render → write →
//! transformed hooks | copy → copied hooks} → done hooks.
//!
//! A [`Pipeline`] owns the renderer registry, the template engine with its
//! partials, and the installed hooks. Build one per invocation.

use crate::config::Config;
use crate::hooks::{Hook, HookChain, Transformed};
use crate::models::{merge_into, BuildReport, FileEntry, ViewModel};
use crate::partials::register_partials;
use crate::render::{RenderError, RenderKind, Renderers};
use crate::script::{ScriptError, ScriptHook};
use crate::templates::TemplateEngine;
use crate::walker::walk;
use crate::writer::{copy_entry, destination_dir, write_rendered, WriteError};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("no file named {} found", path.display())]
    NoSuchFile { path: PathBuf },

    #[error("{} file(s) failed: {}", .0.len(), summarize(.0))]
    Failed(Vec<PipelineError>),
}

impl PipelineError {
    /// Every failed file, flattening an aggregate
    pub fn failed_paths(&self) -> Vec<&Path> {
        match self {
            PipelineError::Render(e) => vec![e.path()],
            PipelineError::Write(e) => vec![e.path.as_path()],
            PipelineError::NoSuchFile { path } => vec![path.as_path()],
            PipelineError::Failed(errors) => errors.iter().flat_map(|e| e.failed_paths()).collect(),
        }
    }
}

fn summarize(errors: &[PipelineError]) -> String {
    errors
        .iter()
        .flat_map(|e| e.failed_paths())
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The build orchestrator
pub struct Pipeline {
    renderers: Renderers,
    engine: TemplateEngine,
    hooks: HookChain,
    /// Merged over every view-model
    locals: ViewModel,
    /// Handed to scripts on load
    options: ViewModel,
    /// Source folder single files are built relative to
    source: Option<PathBuf>,
    fail_fast: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            renderers: Renderers::new(),
            engine: TemplateEngine::new(),
            hooks: HookChain::new(),
            locals: ViewModel::new(),
            options: ViewModel::new(),
            source: None,
            fail_fast: false,
        }
    }

    /// Pipeline set up from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let mut pipeline = Self::new();
        for ext in &config.markup_extensions {
            pipeline.renderers.register(ext, RenderKind::Markup);
        }
        for ext in &config.markdown_extensions {
            pipeline.renderers.register(ext, RenderKind::Markdown);
        }
        pipeline.renderers.set_output_extension(&config.output_extension);
        pipeline.locals = config.locals.clone();
        pipeline.options = config.to_options();
        pipeline.source = Some(config.folder_dir());
        pipeline.fail_fast = config.fail_fast;
        pipeline
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub fn set_locals(&mut self, locals: ViewModel) {
        self.locals = locals;
    }

    /// Source folder that [`Pipeline::transform_file`] resolves files against
    pub fn set_source(&mut self, folder: impl Into<PathBuf>) {
        self.source = Some(folder.into());
    }

    pub fn set_fail_fast(&mut self, fail_fast: bool) {
        self.fail_fast = fail_fast;
    }

    /// Names of installed hooks, in invocation order
    pub fn hook_names(&self) -> Vec<String> {
        self.hooks.names()
    }

    /// Install a hook after the ones already installed.
    pub fn use_hook(&mut self, hook: Box<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Load one script hook and install it.
    pub fn load_script(&mut self, path: &Path) -> Result<(), ScriptError> {
        let hook = ScriptHook::load(path, &self.options)?;
        tracing::info!("Loaded script {} from {}", hook.name(), path.display());
        self.use_hook(Box::new(hook));
        Ok(())
    }

    /// Load every file under `folder` as a script hook, in sorted order.
    ///
    /// A script that fails to load is logged and left out. Returns how many
    /// were installed.
    pub fn load_scripts(&mut self, folder: &Path) -> usize {
        let mut loaded = 0;
        for entry in walk(folder) {
            let path = entry.path();
            match self.load_script(&path) {
                Ok(()) => loaded += 1,
                Err(err) => tracing::error!("Failed to load script {}: {}", path.display(), err),
            }
        }
        loaded
    }

    /// Build every file under `source` into `destination`.
    pub fn transform_folder(
        &mut self,
        source: &Path,
        destination: &Path,
    ) -> Result<BuildReport, PipelineError> {
        tracing::info!("Building {} into {}", source.display(), destination.display());
        self.transform(walk(source), source, destination)
    }

    /// Build a single file.
    ///
    /// The source root is the configured source folder when the file lies
    /// inside it, else the first directory of a relative path
    /// (`www/posts/a.md` builds to `<destination>/posts/a.html` using the
    /// partials under `www`), else the file's own directory. Every file with
    /// the same name below the file's directory is built.
    pub fn transform_file(
        &mut self,
        file: &Path,
        destination: &Path,
    ) -> Result<BuildReport, PipelineError> {
        let file = strip_cur_dir(file);
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PipelineError::NoSuchFile { path: file.clone() })?;
        let parent = parent_dir(&file);
        let source = match &self.source {
            Some(folder) if file.starts_with(strip_cur_dir(folder)) => strip_cur_dir(folder),
            _ => source_root_for(&file),
        };

        let entries: Vec<FileEntry> = walk(&parent).filter(|e| e.name == name).collect();
        if entries.is_empty() {
            return Err(PipelineError::NoSuchFile { path: file });
        }

        tracing::info!("Building {} into {}", file.display(), destination.display());
        self.transform(entries, &source, destination)
    }

    /// Copy the contents of each folder into `destination` without rendering.
    ///
    /// Paths are kept relative to each folder. Layout and partial files and
    /// OS metadata files are skipped. The destination is always created.
    pub fn copy_folders(
        &mut self,
        folders: &[PathBuf],
        destination: &Path,
    ) -> Result<BuildReport, PipelineError> {
        create_destination(destination)?;

        let mut report = BuildReport::default();
        let mut failures: Vec<PipelineError> = Vec::new();
        for folder in folders {
            tracing::info!("Copying {} into {}", folder.display(), destination.display());
            for entry in walk(folder) {
                let hooks = &mut self.hooks;
                match copy_entry(&entry, folder, destination, &mut |path: &Path| hooks.copied(path)) {
                    Ok(copied) => report.copied.extend(copied),
                    Err(err) => {
                        tracing::error!("{}", err);
                        if self.fail_fast {
                            return Err(err.into());
                        }
                        failures.push(err.into());
                    }
                }
            }
        }

        finish(report, failures)
    }

    fn transform(
        &mut self,
        entries: impl IntoIterator<Item = FileEntry>,
        source: &Path,
        destination: &Path,
    ) -> Result<BuildReport, PipelineError> {
        create_destination(destination)?;

        let partials = register_partials(source, &self.renderers, &mut self.engine, &mut self.hooks);
        let mut report = BuildReport {
            partials,
            ..Default::default()
        };
        let mut failures = Vec::new();

        for entry in entries {
            if entry.is_layout_or_partial(source) {
                continue;
            }
            if let Err(err) = self.process(&entry, source, destination, &mut report) {
                tracing::error!("{}", err);
                if self.fail_fast {
                    return Err(err);
                }
                failures.push(err);
            }
        }

        self.hooks.done();
        finish(report, failures)
    }

    /// Render and write one file, or copy it when no renderer claims it.
    fn process(
        &mut self,
        entry: &FileEntry,
        source: &Path,
        destination: &Path,
        report: &mut BuildReport,
    ) -> Result<(), PipelineError> {
        if self.renderers.kind_for(entry).is_none() {
            let hooks = &mut self.hooks;
            let copied = copy_entry(entry, source, destination, &mut |path: &Path| {
                hooks.copied(path)
            })?;
            report.copied.extend(copied);
            return Ok(());
        }

        let model = self.hooks.model(entry);
        let mut options = model.clone();
        merge_into(&mut options, self.locals.clone());

        let rendered = self
            .renderers
            .render(entry, source, &options, &mut self.engine)?;

        let dir = destination_dir(entry, source, destination);
        let (path, text) = write_rendered(&dir, &self.renderers.output_name(entry), &rendered.text)?;

        let view_key = entry.relative_path(source);
        self.hooks.transformed(&Transformed {
            view_key: &view_key,
            destination: &path,
            entry,
            model: &model,
            text: &text,
            view_model: &rendered.view_model,
        });
        report.rendered.push(path);
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn create_destination(destination: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(destination).map_err(|e| WriteError::new(destination, e))?;
    Ok(())
}

fn finish(report: BuildReport, failures: Vec<PipelineError>) -> Result<BuildReport, PipelineError> {
    if failures.is_empty() {
        tracing::info!(
            "Rendered {} file(s), copied {} file(s)",
            report.rendered.len(),
            report.copied.len()
        );
        Ok(report)
    } else {
        Err(PipelineError::Failed(failures))
    }
}

fn strip_cur_dir(path: &Path) -> PathBuf {
    let stripped: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if stripped.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        stripped
    }
}

/// Containing directory, `.` for a bare file name
fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// First directory of a relative multi-component path, else the parent.
fn source_root_for(file: &Path) -> PathBuf {
    let parent = parent_dir(file);
    if file.is_absolute() {
        return parent;
    }
    let mut normal = file.components().filter(|c| !matches!(c, Component::CurDir));
    match (normal.next(), normal.next()) {
        (Some(Component::Normal(first)), Some(_)) => PathBuf::from(first),
        _ => parent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_root_for_relative_and_absolute_paths() {
        assert_eq!(source_root_for(Path::new("www/posts/a.md")), PathBuf::from("www"));
        assert_eq!(source_root_for(Path::new("./www/a.md")), PathBuf::from("www"));
        assert_eq!(source_root_for(Path::new("/srv/www/a.md")), PathBuf::from("/srv/www"));
        assert_eq!(source_root_for(Path::new("a.md")), PathBuf::from("."));
    }

    #[test]
    fn test_failed_lists_every_path() {
        let err = PipelineError::Failed(vec![
            PipelineError::Render(RenderError::MissingLayout {
                path: PathBuf::from("www/a.md"),
            }),
            PipelineError::NoSuchFile {
                path: PathBuf::from("www/b.md"),
            },
        ]);
        assert_eq!(
            err.failed_paths(),
            vec![Path::new("www/a.md"), Path::new("www/b.md")]
        );
        assert_eq!(err.to_string(), "2 file(s) failed: www/a.md, www/b.md");
    }

    #[test]
    fn test_locals_win_over_hook_model() {
        struct Titler;
        impl Hook for Titler {
            fn model(&mut self, _entry: &FileEntry, _model: &ViewModel) -> anyhow::Result<ViewModel> {
                let mut fields = ViewModel::new();
                fields.insert("title".into(), json!("from hook"));
                fields.insert("section".into(), json!("from hook"));
                Ok(fields)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("www");
        let dest = dir.path().join("dist");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("page.html"), "{{ title }}/{{ section }}").unwrap();

        let mut pipeline = Pipeline::new();
        pipeline.use_hook(Box::new(Titler));
        let mut locals = ViewModel::new();
        locals.insert("title".into(), json!("from locals"));
        pipeline.set_locals(locals);

        pipeline.transform_folder(&src, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("page.html")).unwrap(),
            "from locals/from hook"
        );
    }

    #[test]
    fn test_fail_fast_stops_before_done() {
        struct Done(std::sync::Arc<std::sync::atomic::AtomicBool>);
        impl Hook for Done {
            fn done(&mut self) -> anyhow::Result<()> {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("www");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.md"), "no layout here\n").unwrap();
        fs::write(src.join("b.html"), "<p>fine</p>").unwrap();

        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut pipeline = Pipeline::new();
        pipeline.use_hook(Box::new(Done(ran.clone())));
        pipeline.set_fail_fast(true);

        let err = pipeline
            .transform_folder(&src, &dir.path().join("dist"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Render(RenderError::MissingLayout { .. })));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!dir.path().join("dist/b.html").exists());
    }
}

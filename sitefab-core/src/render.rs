//! Per-file render dispatch.
//!
//! A file's extension selects one of a closed set of [`RenderKind`]s. Files
//! whose extension has no kind are not rendered; the pipeline copies them
//! verbatim instead.

use crate::markdown::MarkdownProcessor;
use crate::metadata::{self, ExtractContext};
use crate::models::{merge_into, FileEntry, Rendered, ViewModel};
use crate::templates::TemplateEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default extension markdown sources are written with
pub const DEFAULT_OUTPUT_EXTENSION: &str = "html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid frontmatter in {}: {source}", path.display())]
    Frontmatter {
        path: PathBuf,
        source: crate::frontmatter::FrontmatterError,
    },

    #[error("{} has no `layout` in its frontmatter", path.display())]
    MissingLayout { path: PathBuf },

    #[error("{} uses unknown layout `{layout}`", path.display())]
    UnknownLayout { path: PathBuf, layout: String },

    #[error("failed to render {}: {detail}", path.display())]
    Template { path: PathBuf, detail: String },

    #[error("{} has no renderer", path.display())]
    NotRenderable { path: PathBuf },
}

impl RenderError {
    /// Source file the error belongs to
    pub fn path(&self) -> &Path {
        match self {
            RenderError::Read { path, .. }
            | RenderError::Frontmatter { path, .. }
            | RenderError::MissingLayout { path }
            | RenderError::UnknownLayout { path, .. }
            | RenderError::Template { path, .. }
            | RenderError::NotRenderable { path } => path,
        }
    }
}

/// The kinds of source the pipeline knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    /// Markup and XML-like pages, rendered as templates in place
    Markup,
    /// Markdown with frontmatter, wrapped in a layout
    Markdown,
}

/// Extension → kind registry plus the renderers themselves
pub struct Renderers {
    kinds: BTreeMap<String, RenderKind>,
    output_extension: String,
    markdown: MarkdownProcessor,
}

impl Renderers {
    /// Registry with the built-in extensions: `html` and `xml` as markup,
    /// `md` as markdown.
    pub fn new() -> Self {
        let mut renderers = Self {
            kinds: BTreeMap::new(),
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            markdown: MarkdownProcessor::new(),
        };
        renderers.register("html", RenderKind::Markup);
        renderers.register("xml", RenderKind::Markup);
        renderers.register("md", RenderKind::Markdown);
        renderers
    }

    /// Map an extension (with or without the dot, any case) to a kind.
    pub fn register(&mut self, extension: &str, kind: RenderKind) {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.kinds.insert(ext, kind);
    }

    pub fn set_output_extension(&mut self, extension: &str) {
        self.output_extension = extension.trim_start_matches('.').to_string();
    }

    /// Kind for a file, or `None` when it should be copied verbatim
    pub fn kind_for(&self, entry: &FileEntry) -> Option<RenderKind> {
        entry.extension().and_then(|ext| self.kinds.get(&ext).copied())
    }

    /// Extensions registered for a kind
    pub fn extensions_for(&self, kind: RenderKind) -> impl Iterator<Item = &str> {
        self.kinds
            .iter()
            .filter(move |(_, k)| **k == kind)
            .map(|(ext, _)| ext.as_str())
    }

    /// Output file name: markdown extensions become the output extension,
    /// anything else passes through.
    pub fn output_name(&self, entry: &FileEntry) -> String {
        match self.kind_for(entry) {
            Some(RenderKind::Markdown) => {
                metadata::replace_extension(&entry.name, &self.output_extension)
            }
            _ => entry.name.clone(),
        }
    }

    /// Render a file with the handler its extension selects.
    ///
    /// `options` are merged over the extracted metadata to form the final
    /// view-model.
    pub fn render(
        &self,
        entry: &FileEntry,
        source_root: &Path,
        options: &ViewModel,
        engine: &mut TemplateEngine,
    ) -> Result<Rendered, RenderError> {
        let path = entry.path();
        let kind = self
            .kind_for(entry)
            .ok_or_else(|| RenderError::NotRenderable { path: path.clone() })?;

        let content = fs::read_to_string(&path).map_err(|source| RenderError::Read {
            path: path.clone(),
            source,
        })?;

        let ctx = ExtractContext {
            path: &path,
            source_root,
            output_extension: &self.output_extension,
        };
        let extracted =
            metadata::extract(kind, &content, &ctx).map_err(|source| RenderError::Frontmatter {
                path: path.clone(),
                source,
            })?;

        let template = match kind {
            RenderKind::Markup => extracted.body,
            RenderKind::Markdown => {
                let layout = extracted
                    .metadata
                    .get("layout")
                    .and_then(Value::as_str)
                    .filter(|l| !l.trim().is_empty())
                    .ok_or_else(|| RenderError::MissingLayout { path: path.clone() })?;
                let resolved = self.resolve_layout(engine, layout).ok_or_else(|| {
                    RenderError::UnknownLayout {
                        path: path.clone(),
                        layout: layout.to_string(),
                    }
                })?;
                let body = self.markdown.render(&extracted.body);
                wrap_in_layout(&resolved, &body)
            }
        };

        let mut view_model = extracted.metadata;
        merge_into(&mut view_model, options.clone());

        tracing::debug!("Rendering {}", path.display());
        let text = engine
            .render(&template, &view_model)
            .map_err(|e| RenderError::Template {
                path: path.clone(),
                detail: e.detail(),
            })?;

        Ok(Rendered { text, view_model })
    }

    /// Find the registered partial a frontmatter `layout` value refers to.
    ///
    /// Tried in order: the exact name, `layouts/<name>.<ext>`,
    /// `layouts/<name>`, `<name>.<ext>`, `partials/<name>.<ext>`, where
    /// `<ext>` is each registered markup extension.
    pub fn resolve_layout(&self, engine: &TemplateEngine, layout: &str) -> Option<String> {
        let layout = layout.trim().trim_start_matches('/');
        if engine.has_partial(layout) {
            return Some(layout.to_string());
        }
        let markup: Vec<&str> = self.extensions_for(RenderKind::Markup).collect();
        let mut candidates = Vec::new();
        for ext in &markup {
            candidates.push(format!("layouts/{layout}.{ext}"));
        }
        candidates.push(format!("layouts/{layout}"));
        for ext in &markup {
            candidates.push(format!("{layout}.{ext}"));
            candidates.push(format!("partials/{layout}.{ext}"));
        }
        candidates.into_iter().find(|c| engine.has_partial(c))
    }
}

impl Default for Renderers {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a rendered markdown body in a reference to its layout.
///
/// Layouts expose the body through a `content` block.
pub fn wrap_in_layout(layout: &str, body: &str) -> String {
    format!(
        "{{% extends \"{layout}\" %}}\n{{% block content %}}\n{body}{{% endblock content %}}\n"
    )
}

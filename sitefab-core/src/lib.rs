//! # sitefab-core
//!
//! Core library for the sitefab static site fabricator.
//!
//! This crate turns a source tree of markup, XML and markdown pages into a
//! rendered output tree, copying everything else verbatim, while installed
//! hooks observe and augment every stage.

pub mod config;
mod filters;
pub mod frontmatter;
pub mod hooks;
pub mod markdown;
pub mod metadata;
pub mod models;
pub mod partials;
pub mod pipeline;
pub mod render;
pub mod script;
pub mod templates;
pub mod walker;
pub mod writer;

pub use config::Config;
pub use hooks::{Callback, Hook, HookChain, Transformed};
pub use models::{BuildReport, FileEntry, Rendered, ViewModel};
pub use pipeline::{Pipeline, PipelineError};
pub use render::{RenderError, RenderKind, Renderers};
pub use script::{ScriptError, ScriptHook};
pub use templates::{TemplateEngine, TemplateError};

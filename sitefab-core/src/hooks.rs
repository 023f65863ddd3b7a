//! Extension hooks observing and augmenting each pipeline stage.
//!
//! Hooks run in registration order for every callback. A hook that fails (or
//! panics) is logged and skipped for that event; the remaining hooks and the
//! run itself carry on.

use crate::models::{merge_into, FileEntry, ViewModel};
use crate::templates::TemplateEngine;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// Callback points a hook may take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    Model,
    Partial,
    Copied,
    Transformed,
    Done,
}

impl Callback {
    pub const ALL: [Callback; 5] = [
        Callback::Model,
        Callback::Partial,
        Callback::Copied,
        Callback::Transformed,
        Callback::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Callback::Model => "model",
            Callback::Partial => "partial",
            Callback::Copied => "copied",
            Callback::Transformed => "transformed",
            Callback::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Everything known about a file once it has been rendered and written
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformed<'a> {
    /// Source path relative to the source root
    pub view_key: &'a str,
    /// Where the rendered text was written
    pub destination: &'a Path,
    pub entry: &'a FileEntry,
    /// Fields contributed by `model` hooks
    pub model: &'a ViewModel,
    /// Text as written, after whitespace normalization
    pub text: &'a str,
    /// View-model the template was rendered with
    pub view_model: &'a ViewModel,
}

/// An extension taking part in a pipeline run.
///
/// Every callback has a no-op default, so a hook implements only the ones it
/// cares about.
pub trait Hook: Send {
    /// Name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Contribute view-model fields before a file is rendered.
    ///
    /// `model` holds what earlier hooks contributed for the same file.
    fn model(&mut self, _entry: &FileEntry, _model: &ViewModel) -> anyhow::Result<ViewModel> {
        Ok(ViewModel::new())
    }

    /// Observe a registered partial or layout.
    fn partial(
        &mut self,
        _name: &str,
        _text: &str,
        _engine: &mut TemplateEngine,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Observe a completed verbatim copy.
    fn copied(&mut self, _destination: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    /// Observe a completed render and write.
    fn transformed(&mut self, _event: &Transformed<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Observe the end of a pipeline run.
    fn done(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ordered list of installed hooks
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn Hook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Box<dyn Hook>) {
        tracing::debug!("Installed hook {}", hook.name());
        self.hooks.push(hook);
    }

    /// Hook names in invocation order
    pub fn names(&self) -> Vec<String> {
        self.hooks.iter().map(|h| h.name().to_string()).collect()
    }

    /// Collect the view-model contributions for a file; later hooks win.
    pub fn model(&mut self, entry: &FileEntry) -> ViewModel {
        let mut model = ViewModel::new();
        for hook in &mut self.hooks {
            let result = guard(hook.as_mut(), Callback::Model, |h| h.model(entry, &model));
            if let Some(fields) = result {
                merge_into(&mut model, fields);
            }
        }
        model
    }

    pub fn partial(&mut self, name: &str, text: &str, engine: &mut TemplateEngine) {
        for hook in &mut self.hooks {
            guard(hook.as_mut(), Callback::Partial, |h| h.partial(name, text, engine));
        }
    }

    pub fn copied(&mut self, destination: &Path) {
        for hook in &mut self.hooks {
            guard(hook.as_mut(), Callback::Copied, |h| h.copied(destination));
        }
    }

    pub fn transformed(&mut self, event: &Transformed<'_>) {
        for hook in &mut self.hooks {
            guard(hook.as_mut(), Callback::Transformed, |h| h.transformed(event));
        }
    }

    pub fn done(&mut self) {
        for hook in &mut self.hooks {
            guard(hook.as_mut(), Callback::Done, |h| h.done());
        }
    }
}

/// Run one callback, logging (and swallowing) its failure.
fn guard<T>(
    hook: &mut dyn Hook,
    callback: Callback,
    f: impl FnOnce(&mut dyn Hook) -> anyhow::Result<T>,
) -> Option<T> {
    let name = hook.name().to_string();
    match catch_unwind(AssertUnwindSafe(|| f(hook))) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            tracing::error!("Hook {} failed in {}: {:#}", name, callback.as_str(), err);
            None
        }
        Err(_) => {
            tracing::error!("Hook {} panicked in {}", name, callback.as_str());
            None
        }
    }
}

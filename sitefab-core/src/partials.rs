//! Registration of layout and partial templates found in the source tree.

use crate::hooks::HookChain;
use crate::models::{to_slash, FileEntry};
use crate::render::{RenderKind, Renderers};
use crate::templates::TemplateEngine;
use crate::walker::walk;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Whether an entry is a layout or partial template: it sits under a
/// `layouts` or `partials` directory and has a markup extension.
pub fn is_partial_file(entry: &FileEntry, source_root: &Path, renderers: &Renderers) -> bool {
    entry.is_layout_or_partial(source_root)
        && renderers.kind_for(entry) == Some(RenderKind::Markup)
}

/// Name a partial is registered under: the path below the last directory
/// named like the source root's final segment, `/`-separated.
///
/// A nested `www/a/www/layouts/base.html` is named `layouts/base.html`, the
/// same as `www/layouts/base.html`, so the later scan wins.
pub fn partial_name(entry: &FileEntry, source_root: &Path) -> String {
    let Some(root_name) = source_root.file_name() else {
        return entry.relative_path(source_root);
    };
    let dir: Vec<Component<'_>> = entry.dir.components().collect();
    match dir.iter().rposition(|c| c.as_os_str() == root_name) {
        Some(index) => {
            let mut rel: PathBuf = dir[index + 1..].iter().collect();
            rel.push(&entry.name);
            to_slash(&rel)
        }
        None => entry.relative_path(source_root),
    }
}

/// Scan the whole source tree and register every layout and partial.
///
/// Files are registered in traversal order, so when two names collide the
/// later one wins. The `partial` hooks fire once per file, after it is
/// registered. Returns the registered names in order.
pub fn register_partials(
    source_root: &Path,
    renderers: &Renderers,
    engine: &mut TemplateEngine,
    hooks: &mut HookChain,
) -> Vec<String> {
    let mut names = Vec::new();

    for entry in walk(source_root) {
        if !is_partial_file(&entry, source_root, renderers) {
            continue;
        }

        let path = entry.path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("Failed to read partial {}: {}", path.display(), err);
                continue;
            }
        };

        let name = partial_name(&entry, source_root);
        tracing::debug!("Registering partial {} from {}", name, path.display());
        engine.register_partial(&name, &text);
        hooks.partial(&name, &text, engine);
        names.push(name);
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::Hook;
    use crate::models::ViewModel;
    use std::sync::{Arc, Mutex};

    struct SeenPartials(Arc<Mutex<Vec<String>>>);

    impl Hook for SeenPartials {
        fn partial(&mut self, name: &str, _text: &str, engine: &mut TemplateEngine) -> anyhow::Result<()> {
            assert!(engine.has_partial(name), "hook fires after registration");
            self.0.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_registers_layouts_and_partials_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("layouts")).unwrap();
        fs::create_dir_all(root.join("blog/Partials")).unwrap();
        fs::write(root.join("layouts/base.html"), "<main>{% block content %}{% endblock content %}</main>").unwrap();
        fs::write(root.join("layouts/notes.txt"), "not a template").unwrap();
        fs::write(root.join("blog/Partials/card.html"), "<div>{{ title }}</div>").unwrap();
        fs::write(root.join("index.html"), "<p>page</p>").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookChain::new();
        hooks.push(Box::new(SeenPartials(seen.clone())));
        let mut engine = TemplateEngine::new();

        let names = register_partials(root, &Renderers::new(), &mut engine, &mut hooks);

        assert_eq!(names, vec!["blog/Partials/card.html", "layouts/base.html"]);
        assert_eq!(*seen.lock().unwrap(), names);
        assert!(!engine.has_partial("index.html"));
        assert!(!engine.has_partial("layouts/notes.txt"));
    }

    #[test]
    fn test_partial_name_is_relative_to_root() {
        let root = Path::new("/srv/site/www");
        let entry = FileEntry::new("/srv/site/www/layouts/nested", "post.html", false);
        assert_eq!(partial_name(&entry, root), "layouts/nested/post.html");
    }

    #[test]
    fn test_partial_name_cuts_after_last_root_segment() {
        let root = Path::new("/srv/site/www");
        let nested = FileEntry::new("/srv/site/www/a/www/layouts", "base.html", false);
        assert_eq!(partial_name(&nested, root), "layouts/base.html");

        let relative = FileEntry::new("www/partials", "nav.html", false);
        assert_eq!(partial_name(&relative, Path::new("www")), "partials/nav.html");
    }

    #[test]
    fn test_registered_partial_renders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("partials")).unwrap();
        fs::write(root.join("partials/hello.html"), "Hello").unwrap();

        let mut engine = TemplateEngine::new();
        register_partials(root, &Renderers::new(), &mut engine, &mut HookChain::new());

        let out = engine
            .render(r#"{% include "partials/hello.html" %}!"#, &ViewModel::new())
            .unwrap();
        assert_eq!(out, "Hello!");
    }
}

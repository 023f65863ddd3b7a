//! Tera-backed template engine holding the partial and layout registry.
//!
//! A lookup the view-model cannot answer renders as an empty string rather
//! than failing the page. Before each render the engine scans the page and
//! its partials for context lookups and fills the missing ones with `""`
//! (or `[]` when the lookup is iterated by a `for` loop or tested with `in`).
//! Lookups guarded by `is defined` or `| default(...)` are left alone.

use crate::filters;
use crate::models::ViewModel;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load partials: {0}")]
    Partials(#[source] tera::Error),

    #[error("render error: {0}")]
    Render(#[source] tera::Error),
}

impl TemplateError {
    /// Full cause chain, since tera nests the useful detail in sources.
    pub fn detail(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self).and_then(std::error::Error::source);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Template engine wrapping Tera with a name → text partial registry.
///
/// Partials are kept as raw text and loaded into Tera together before the
/// next render, so a layout may extend another layout registered after it.
/// Registering a name twice keeps the later text.
#[derive(Debug)]
pub struct TemplateEngine {
    tera: Tera,
    partials: BTreeMap<String, String>,
    /// Lookups made by the registered partials
    lookups: BTreeSet<Lookup>,
    dirty: bool,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            tera: new_tera(),
            partials: BTreeMap::new(),
            lookups: BTreeSet::new(),
            dirty: false,
        }
    }

    /// Register (or replace) a named partial.
    pub fn register_partial(&mut self, name: &str, text: &str) {
        self.partials.insert(name.to_string(), text.to_string());
        self.dirty = true;
    }

    /// Whether a partial is registered under `name`
    pub fn has_partial(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    /// Raw text of a registered partial
    pub fn partial(&self, name: &str) -> Option<&str> {
        self.partials.get(name).map(String::as_str)
    }

    /// Registered partial names, sorted
    pub fn partial_names(&self) -> impl Iterator<Item = &str> {
        self.partials.keys().map(String::as_str)
    }

    /// Render one-off template text against a view-model.
    ///
    /// The text may extend or include any registered partial. Keys missing
    /// from the view-model render empty.
    pub fn render(&mut self, text: &str, view_model: &ViewModel) -> Result<String, TemplateError> {
        self.sync()?;
        let mut data = view_model.clone();
        let mut lookups = find_lookups(text);
        lookups.extend(self.lookups.iter().cloned());
        fill_missing(&mut data, &lookups);
        let context = Context::from_value(Value::Object(data)).map_err(TemplateError::Render)?;
        self.tera
            .render_str(text, &context)
            .map_err(TemplateError::Render)
    }

    fn sync(&mut self) -> Result<(), TemplateError> {
        if !self.dirty {
            return Ok(());
        }
        let mut tera = new_tera();
        tera.add_raw_templates(
            self.partials
                .iter()
                .map(|(name, text)| (name.as_str(), text.as_str())),
        )
        .map_err(TemplateError::Partials)?;
        self.lookups = self.partials.values().flat_map(|text| find_lookups(text)).collect();
        self.tera = tera;
        self.dirty = false;
        Ok(())
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn new_tera() -> Tera {
    let mut tera = Tera::default();
    // Sources are authored content; values are inserted as written
    tera.autoescape_on(vec![]);
    tera.register_filter("current", filters::current);
    tera.register_filter("unescape_amp", filters::unescape_amp);
    tera
}

// ============================================================================
// Missing lookups
// ============================================================================

/// Words that read like lookups inside tags but are not
const RESERVED: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "elif", "else", "endif", "for", "endfor", "block",
    "endblock", "extends", "include", "import", "macro", "endmacro", "set", "set_global",
    "filter", "endfilter", "raw", "endraw", "break", "continue", "super", "self", "loop",
    "true", "false", "True", "False", "as", "with", "ignore", "missing", "__tera_context",
];

/// A dotted context lookup found in template text
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Lookup {
    path: String,
    /// Used as the container of a `for` loop or an `in` test
    iterated: bool,
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}|\{%(.*?)%\}").unwrap())
}

fn string_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|`[^`]*`"#).unwrap())
}

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^\w.])([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)").unwrap()
    })
}

fn find_lookups(text: &str) -> BTreeSet<Lookup> {
    let mut found = BTreeSet::new();
    for tag in tag_regex().captures_iter(text) {
        let Some(body) = tag.get(1).or_else(|| tag.get(2)) else {
            continue;
        };
        let body = string_regex().replace_all(body.as_str(), "\"\"");
        for capture in path_regex().captures_iter(&body) {
            let Some(path) = capture.get(1) else {
                continue;
            };
            let before = body[..path.start()].trim_end();
            let after = body[path.end()..].trim_start();
            let head = path.as_str().split('.').next().unwrap_or_default();
            let skip = RESERVED.contains(&head)
                // filter names, calls, kwargs and assignment targets
                || before.ends_with('|')
                || after.starts_with('(')
                || after.starts_with("::")
                || after.starts_with('[')
                || (after.starts_with('=') && !after.starts_with("=="))
                // guarded lookups
                || after.starts_with("is ")
                || after
                    .strip_prefix('|')
                    .is_some_and(|rest| rest.trim_start().starts_with("default"));
            if skip {
                continue;
            }
            found.insert(Lookup {
                path: path.as_str().to_string(),
                iterated: ends_with_word(before, "in"),
            });
        }
    }
    found
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text.strip_suffix(word)
        .is_some_and(|rest| !rest.ends_with(|c: char| c.is_alphanumeric() || c == '_'))
}

/// Insert an empty value for every lookup the view-model cannot answer.
///
/// Deeper paths go first so `page` and `page.title` both resolve.
fn fill_missing(model: &mut ViewModel, lookups: &BTreeSet<Lookup>) {
    let mut ordered: Vec<&Lookup> = lookups.iter().collect();
    ordered.sort_by_key(|l| (Reverse(l.path.matches('.').count()), !l.iterated));
    for lookup in ordered {
        let segments: Vec<&str> = lookup.path.split('.').collect();
        let empty = if lookup.iterated {
            Value::Array(Vec::new())
        } else {
            Value::String(String::new())
        };
        fill_path(model, &segments, empty);
    }
}

fn fill_path(model: &mut ViewModel, segments: &[&str], empty: Value) {
    match segments {
        [] => {}
        [last] => {
            model.entry(last.to_string()).or_insert(empty);
        }
        [first, rest @ ..] => {
            let next = model
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = next {
                fill_path(inner, rest, empty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(pairs: &[(&str, Value)]) -> ViewModel {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_with_view_model() {
        let mut engine = TemplateEngine::new();
        let out = engine
            .render("<h1>{{ title }}</h1>", &model(&[("title", json!("Hi & bye"))]))
            .unwrap();
        assert_eq!(out, "<h1>Hi & bye</h1>");
    }

    #[test]
    fn test_extends_registered_layout() {
        let mut engine = TemplateEngine::new();
        engine.register_partial(
            "layouts/base.html",
            "<main>{% block content %}{% endblock content %}</main>",
        );
        let out = engine
            .render(
                r#"{% extends "layouts/base.html" %}{% block content %}<p>{{ x }}</p>{% endblock content %}"#,
                &model(&[("x", json!(1))]),
            )
            .unwrap();
        assert_eq!(out, "<main><p>1</p></main>");
    }

    #[test]
    fn test_layout_may_extend_later_registered_layout() {
        let mut engine = TemplateEngine::new();
        engine.register_partial(
            "layouts/post.html",
            r#"{% extends "layouts/root.html" %}{% block content %}<article>{% block body %}{% endblock body %}</article>{% endblock content %}"#,
        );
        engine.register_partial(
            "layouts/root.html",
            "<html>{% block content %}{% endblock content %}</html>",
        );
        let out = engine
            .render(
                r#"{% extends "layouts/post.html" %}{% block body %}B{% endblock body %}"#,
                &ViewModel::new(),
            )
            .unwrap();
        assert_eq!(out, "<html><article>B</article></html>");
    }

    #[test]
    fn test_reregistration_last_writer_wins() {
        let mut engine = TemplateEngine::new();
        engine.register_partial("partials/nav.html", "first");
        engine.register_partial("partials/nav.html", "second");
        let out = engine
            .render(r#"{% include "partials/nav.html" %}"#, &ViewModel::new())
            .unwrap();
        assert_eq!(out, "second");
        assert_eq!(engine.partial_names().count(), 1);
    }

    #[test]
    fn test_missing_key_renders_empty() {
        let mut engine = TemplateEngine::new();
        let out = engine.render("[{{ subtitle }}]", &ViewModel::new()).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_missing_keys_in_layouts_and_nested_paths_render_empty() {
        let mut engine = TemplateEngine::new();
        engine.register_partial(
            "layouts/base.html",
            "<title>{{ title }}</title>{{ page.author.name }}|{% if page %}P{% endif %}|{% block content %}{% endblock content %}",
        );
        let out = engine
            .render(
                r#"{% extends "layouts/base.html" %}{% block content %}{% if draft %}D{% endif %}{% for t in tags %}{{ t }}{% endfor %}ok{% endblock content %}"#,
                &ViewModel::new(),
            )
            .unwrap();
        assert_eq!(out, "<title></title>|P|ok");
    }

    #[test]
    fn test_guarded_lookups_keep_their_meaning() {
        let mut engine = TemplateEngine::new();
        let out = engine
            .render(
                r#"{{ title | default(value="Untitled") }}{% if note is defined %}!{% endif %}"#,
                &ViewModel::new(),
            )
            .unwrap();
        assert_eq!(out, "Untitled");
    }

    #[test]
    fn test_present_keys_are_not_overwritten() {
        let mut engine = TemplateEngine::new();
        let out = engine
            .render(
                "{{ title }}/{{ page.title }}/{% for t in tags %}{{ t }}{% endfor %}",
                &model(&[
                    ("title", json!("T")),
                    ("page", json!({"title": "P"})),
                    ("tags", json!(["a", "b"])),
                ]),
            )
            .unwrap();
        assert_eq!(out, "T/P/ab");
    }

    #[test]
    fn test_site_filters_are_registered() {
        let mut engine = TemplateEngine::new();
        let out = engine
            .render(
                r#"<a class="nav{{ uri | current(page="about.html") }}">{{ link | unescape_amp }}</a>"#,
                &model(&[("uri", json!("/about.html")), ("link", json!("?a=1&amp;b=2"))]),
            )
            .unwrap();
        assert_eq!(out, r#"<a class="nav current">?a=1&b=2</a>"#);
    }
}

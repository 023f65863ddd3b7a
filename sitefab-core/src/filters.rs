//! Template filters available to every page, layout and partial.

use std::collections::HashMap;

use tera::{Result, Value};

/// `{{ uri | current(page="/about.html") }}` yields `" current"` when the
/// value ends with `page`, and an empty string otherwise. Handy for marking
/// the active navigation link.
pub(crate) fn current(value: &Value, args: &HashMap<String, Value>) -> Result<Value> {
    let page = args
        .get("page")
        .and_then(Value::as_str)
        .ok_or_else(|| tera::Error::msg("current filter expects a `page` string argument"))?;
    let marked = match value.as_str() {
        Some(uri) if !uri.is_empty() && uri.ends_with(page) => " current",
        _ => "",
    };
    Ok(Value::String(marked.to_string()))
}

/// Undo `&amp;` escaping, for URLs that were stored escaped.
pub(crate) fn unescape_amp(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("unescape_amp filter expects a string"))?;
    Ok(Value::String(s.replace("&amp;", "&")))
}

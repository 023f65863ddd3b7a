//! Frontmatter parsing from markdown files.

use crate::models::ViewModel;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Frontmatter must be a mapping of keys to values")]
    NotAMapping,
}

/// Result of a single parse: the frontmatter fields and the markdown body.
///
/// Every call produces a fresh value, so fields from one document can never
/// show up in the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    pub fields: ViewModel,
    pub body: String,
}

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)(.*)\z").unwrap()
    })
}

/// Parse frontmatter from markdown content
///
/// If no frontmatter is present, the fields are empty and the full content is
/// the body.
///
/// # Example
///
/// ```
/// use sitefab_core::frontmatter::parse_frontmatter;
///
/// let content = "---\nlayout: base\ntitle: My Post\n---\n# Hello World\n";
///
/// let fm = parse_frontmatter(content).unwrap();
/// assert_eq!(fm.fields["title"], "My Post");
/// assert!(fm.body.starts_with("# Hello World"));
/// ```
pub fn parse_frontmatter(content: &str) -> Result<FrontMatter, FrontmatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let re = frontmatter_regex();

    let Some(captures) = re.captures(content) else {
        return Ok(FrontMatter {
            fields: ViewModel::new(),
            body: content.to_string(),
        });
    };

    let yaml = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

    let fields = match serde_yaml::from_str::<Value>(yaml)? {
        Value::Object(map) => map,
        Value::Null => ViewModel::new(),
        _ => return Err(FrontmatterError::NotAMapping),
    };

    Ok(FrontMatter {
        fields,
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_frontmatter() {
        let content = r#"---
layout: base
title: Test Post
published: 2025-01-01
---

# Hello World

This is the content."#;

        let fm = parse_frontmatter(content).unwrap();
        assert_eq!(fm.fields["layout"], json!("base"));
        assert_eq!(fm.fields["title"], json!("Test Post"));
        assert_eq!(fm.fields["published"], json!("2025-01-01"));
        assert!(fm.body.contains("# Hello World"));
        assert!(fm.body.contains("This is the content."));
    }

    #[test]
    fn test_parse_frontmatter_with_tag_list() {
        let content = r#"---
tags:
  - rust
  - programming
---

Content."#;

        let fm = parse_frontmatter(content).unwrap();
        assert_eq!(fm.fields["tags"], json!(["rust", "programming"]));
    }

    #[test]
    fn test_parse_no_frontmatter() {
        let content = "# Just Content\n\nNo frontmatter here.";
        let fm = parse_frontmatter(content).unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, content);
    }

    #[test]
    fn test_parse_empty_frontmatter() {
        let fm = parse_frontmatter("---\n---\nBody").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "Body");
    }

    #[test]
    fn test_crlf_line_endings() {
        let fm = parse_frontmatter("---\r\nlayout: base\r\n---\r\nBody").unwrap();
        assert_eq!(fm.fields["layout"], json!("base"));
        assert_eq!(fm.body, "Body");
    }

    #[test]
    fn test_invalid_yaml() {
        let content = r#"---
title: Test
invalid yaml: [unclosed
---

Content."#;

        assert!(parse_frontmatter(content).is_err());
    }

    #[test]
    fn test_non_mapping_is_rejected() {
        let result = parse_frontmatter("---\n- a\n- b\n---\nBody");
        assert!(matches!(result, Err(FrontmatterError::NotAMapping)));
    }

    #[test]
    fn test_parses_are_independent() {
        let first = parse_frontmatter("---\nlayout: base\nsubtitle: only here\n---\nA").unwrap();
        let second = parse_frontmatter("---\nlayout: base\n---\nB").unwrap();
        assert!(first.fields.contains_key("subtitle"));
        assert!(!second.fields.contains_key("subtitle"));
    }
}

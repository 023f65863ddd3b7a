//! Metadata extraction for markup and markdown sources.
//!
//! Markup pages carry their metadata inline: elements with an `itemprop`
//! attribute and named `<meta>` tags. Markdown pages carry it in a YAML
//! frontmatter block, from which a handful of link and date fields are derived.

use crate::frontmatter::{parse_frontmatter, FrontmatterError};
use crate::models::{to_slash, ViewModel};
use crate::render::RenderKind;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// Display format for `displayDate`, e.g. "Monday, January 1, 2024, 09:30 AM"
const DISPLAY_DATE_FORMAT: &str = "%A, %B %-d, %Y, %I:%M %p";

/// Where the file being extracted lives
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    /// Full path to the source file
    pub path: &'a Path,
    /// Root of the source tree
    pub source_root: &'a Path,
    /// Extension markdown files are written with
    pub output_extension: &'a str,
}

impl ExtractContext<'_> {
    /// Source path relative to the root, `/`-separated
    fn relative(&self) -> String {
        let rel = self.path.strip_prefix(self.source_root).unwrap_or(self.path);
        to_slash(rel)
    }
}

/// Extracted metadata plus the template text that remains to be rendered
#[derive(Debug, Clone)]
pub struct Extracted {
    pub metadata: ViewModel,
    pub body: String,
}

/// Extract metadata for a file of the given kind.
///
/// For markup the body is the whole file. For markdown the body is the
/// document with its frontmatter removed.
pub fn extract(
    kind: RenderKind,
    content: &str,
    ctx: &ExtractContext<'_>,
) -> Result<Extracted, FrontmatterError> {
    match kind {
        RenderKind::Markup => Ok(Extracted {
            metadata: extract_markup(content, ctx),
            body: content.to_string(),
        }),
        RenderKind::Markdown => extract_markdown(content, ctx),
    }
}

// ============================================================================
// Markup
// ============================================================================

/// Extract `itemprop` properties, link fields and named `<meta>` pairs.
pub fn extract_markup(content: &str, ctx: &ExtractContext<'_>) -> ViewModel {
    let mut props = ViewModel::new();
    let mut metas: Vec<(String, String)> = Vec::new();
    let mut headline: Option<TextCapture> = None;

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                if let Some(capture) = headline.as_mut() {
                    if elem.name().as_ref().eq_ignore_ascii_case(&capture.tag) {
                        capture.depth += 1;
                    }
                }
                if let Some(tag) = inspect_element(&elem, &mut props, &mut metas) {
                    if headline.is_none() {
                        headline = Some(TextCapture::new(tag));
                    }
                }
            }
            Ok(Event::Empty(elem)) => {
                if inspect_element(&elem, &mut props, &mut metas).is_some() {
                    props.insert("headline".into(), Value::String(String::new()));
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(capture) = headline.as_mut() {
                    let raw = String::from_utf8_lossy(text.as_ref()).into_owned();
                    let unescaped = text.unescape().map(Cow::into_owned).unwrap_or(raw);
                    capture.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(capture) = headline.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(data.as_ref()));
                }
            }
            Ok(Event::End(elem)) => {
                let closes = headline
                    .as_ref()
                    .is_some_and(|c| elem.name().as_ref().eq_ignore_ascii_case(&c.tag));
                if closes {
                    if let Some(mut capture) = headline.take() {
                        if capture.depth == 0 {
                            props.insert("headline".into(), Value::String(capture.text));
                        } else {
                            capture.depth -= 1;
                            headline = Some(capture);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                // Template syntax can trip the lenient parser; keep what was found
                tracing::debug!(
                    "Stopped scanning {} at byte {}: {}",
                    ctx.path.display(),
                    reader.error_position(),
                    err
                );
                break;
            }
        }
    }

    if let Some(capture) = headline {
        props.insert("headline".into(), Value::String(capture.text));
    }

    let uri = format!("/{}", ctx.relative());
    props.insert("relativeLink".into(), Value::String(uri[1..].to_string()));
    props.insert("uri".into(), Value::String(uri));

    for (name, content) in metas {
        let value = if name == "tags" {
            split_tags(&content)
        } else {
            Value::String(content)
        };
        props.insert(name, value);
    }

    props
}

/// Text collected for a `headline` element until its end tag
struct TextCapture {
    tag: Vec<u8>,
    depth: usize,
    text: String,
}

impl TextCapture {
    fn new(tag: Vec<u8>) -> Self {
        Self {
            tag,
            depth: 0,
            text: String::new(),
        }
    }
}

/// Record the metadata an element carries.
///
/// Returns the element name when it is a `headline` property whose text still
/// has to be collected.
fn inspect_element(
    elem: &BytesStart<'_>,
    props: &mut ViewModel,
    metas: &mut Vec<(String, String)>,
) -> Option<Vec<u8>> {
    let mut itemprop = None;
    let mut content = None;
    let mut datetime = None;
    let mut name = None;

    for attr in elem.html_attributes().flatten() {
        let value = attr
            .unescape_value()
            .map(Cow::into_owned)
            .unwrap_or_else(|_| String::from_utf8_lossy(attr.value.as_ref()).into_owned());
        match attr.key.as_ref() {
            b"itemprop" => itemprop = Some(value),
            b"content" => content = Some(value),
            b"datetime" => datetime = Some(value),
            b"name" => name = Some(value),
            _ => {}
        }
    }

    if elem.name().as_ref().eq_ignore_ascii_case(b"meta") {
        if let (Some(name), Some(content)) = (name, content.clone()) {
            metas.push((name, content));
        }
    }

    let prop = itemprop?;
    match prop.as_str() {
        "headline" => return Some(elem.name().as_ref().to_vec()),
        "published" => {
            let raw = datetime.or(content).unwrap_or_default();
            let value = normalize_date(&raw).unwrap_or(raw);
            props.insert(prop, Value::String(value));
        }
        _ => {
            if let Some(content) = content {
                props.insert(prop, Value::String(content));
            }
        }
    }
    None
}

// ============================================================================
// Markdown
// ============================================================================

/// Parse frontmatter and add the derived fields.
///
/// Derived fields: `permalink`, `relativeLink`, `tags` (always a list),
/// `birthtime` (file creation time) and `displayDate` (when `published`
/// parses as a date).
pub fn extract_markdown(
    content: &str,
    ctx: &ExtractContext<'_>,
) -> Result<Extracted, FrontmatterError> {
    let parsed = parse_frontmatter(content)?;
    let mut meta = parsed.fields;

    let permalink = format!("/{}", replace_extension(&ctx.relative(), ctx.output_extension));
    meta.insert("relativeLink".into(), Value::String(permalink[1..].to_string()));
    meta.insert("permalink".into(), Value::String(permalink));

    let tags = match meta.remove("tags") {
        Some(Value::String(s)) => split_tags(&s),
        Some(Value::Array(items)) => Value::Array(items),
        Some(Value::Null) | None => Value::Array(Vec::new()),
        Some(other) => Value::Array(vec![other]),
    };
    meta.insert("tags".into(), tags);

    match birthtime(ctx.path) {
        Ok(created) => {
            meta.insert(
                "birthtime".into(),
                Value::String(created.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        Err(err) => tracing::error!("Failed to stat {}: {}", ctx.path.display(), err),
    }

    let display = meta
        .get("published")
        .and_then(Value::as_str)
        .and_then(parse_date)
        .map(|d| d.format(DISPLAY_DATE_FORMAT).to_string());
    if let Some(display) = display {
        meta.insert("displayDate".into(), Value::String(display));
    }

    Ok(Extracted {
        metadata: meta,
        body: parsed.body,
    })
}

/// Creation time of a file, or its modification time where the platform
/// does not record creation.
fn birthtime(path: &Path) -> std::io::Result<DateTime<Utc>> {
    let meta = fs::metadata(path)?;
    let time = meta.created().or_else(|_| meta.modified())?;
    Ok(DateTime::<Utc>::from(time))
}

/// Replace the final extension of a `/`-separated path.
pub fn replace_extension(path: &str, extension: &str) -> String {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{}", &path[..file_start + dot], extension),
        _ => format!("{path}.{extension}"),
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Split a comma-separated tag string into a list, dropping empty entries.
pub fn split_tags(raw: &str) -> Value {
    Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Value::String(t.to_string()))
            .collect(),
    )
}

/// Parse the date formats accepted for `published`.
///
/// Offsets are applied: the result is the wall-clock time in the given zone.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// RFC 3339 form of a parseable date; offsets are preserved, naive times are UTC.
fn normalize_date(raw: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    parse_date(raw).map(|d| d.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
}

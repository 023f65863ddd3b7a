//! Hooks implemented by external executables.
//!
//! A script is run once per callback as `<script> <callback>` with a JSON
//! payload on stdin. Loading runs `<script> init` with the resolved options;
//! the script answers with the callbacks it implements:
//!
//! ```json
//! {"name": "sitemap", "hooks": ["transformed", "done"]}
//! ```
//!
//! `model` answers with a JSON object of view-model fields. `partial` may
//! answer `{"partials": {"name": "text"}}` to register more partials. Other
//! callbacks ignore stdout.

use crate::hooks::{Callback, Hook, Transformed};
use crate::models::{FileEntry, ViewModel};
use crate::templates::TemplateEngine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} {event} exited with code {code}: {stderr}", path.display())]
    NonZeroExit {
        path: PathBuf,
        event: String,
        code: i32,
        stderr: String,
    },

    #[error("{} {event} printed invalid output: {message}", path.display())]
    InvalidOutput {
        path: PathBuf,
        event: String,
        message: String,
    },

    #[error("failed to encode payload for {}: {source}", path.display())]
    Payload {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Answer to `<script> init`
#[derive(Debug, Deserialize)]
struct Registration {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hooks: Vec<String>,
}

/// Answer to `<script> partial`
#[derive(Debug, Default, Deserialize)]
struct PartialAnswer {
    #[serde(default)]
    partials: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct InitPayload<'a, T: Serialize> {
    options: &'a T,
}

#[derive(Serialize)]
struct ModelPayload<'a> {
    entry: &'a FileEntry,
    path: PathBuf,
    model: &'a ViewModel,
}

#[derive(Serialize)]
struct CopiedPayload<'a> {
    destination: &'a Path,
}

/// A hook backed by an external executable
#[derive(Debug)]
pub struct ScriptHook {
    path: PathBuf,
    name: String,
    callbacks: HashSet<Callback>,
}

impl ScriptHook {
    /// Run the script's `init` step and record the callbacks it implements.
    pub fn load(path: &Path, options: &impl Serialize) -> Result<Self, ScriptError> {
        let stdout = run(path, "init", &InitPayload { options })?;
        let registration: Registration = parse_json(path, "init", &stdout)?;

        let mut callbacks = HashSet::new();
        for hook in &registration.hooks {
            match Callback::from_str(hook) {
                Some(cb) => {
                    callbacks.insert(cb);
                }
                None => tracing::warn!("{} registered unknown hook '{}'", path.display(), hook),
            }
        }

        let name = registration.name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

        Ok(Self {
            path: path.to_path_buf(),
            name,
            callbacks,
        })
    }

    /// Whether the script registered for a callback
    pub fn implements(&self, callback: Callback) -> bool {
        self.callbacks.contains(&callback)
    }

    fn call(&self, callback: Callback, payload: &impl Serialize) -> Result<Vec<u8>, ScriptError> {
        run(&self.path, callback.as_str(), payload)
    }
}

impl Hook for ScriptHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&mut self, entry: &FileEntry, model: &ViewModel) -> anyhow::Result<ViewModel> {
        if !self.implements(Callback::Model) {
            return Ok(ViewModel::new());
        }
        let payload = ModelPayload {
            entry,
            path: entry.path(),
            model,
        };
        let stdout = self.call(Callback::Model, &payload)?;
        if is_blank(&stdout) {
            return Ok(ViewModel::new());
        }
        match parse_json::<Value>(&self.path, "model", &stdout)? {
            Value::Object(fields) => Ok(fields),
            other => anyhow::bail!(
                "{} model must print a JSON object, got {}",
                self.path.display(),
                other
            ),
        }
    }

    fn partial(&mut self, name: &str, text: &str, engine: &mut TemplateEngine) -> anyhow::Result<()> {
        if !self.implements(Callback::Partial) {
            return Ok(());
        }
        let stdout = self.call(Callback::Partial, &json!({ "name": name, "text": text }))?;
        if is_blank(&stdout) {
            return Ok(());
        }
        let answer: PartialAnswer = parse_json(&self.path, "partial", &stdout)?;
        for (extra, text) in answer.partials {
            tracing::debug!("{} registered partial {}", self.name, extra);
            engine.register_partial(&extra, &text);
        }
        Ok(())
    }

    fn copied(&mut self, destination: &Path) -> anyhow::Result<()> {
        if self.implements(Callback::Copied) {
            self.call(Callback::Copied, &CopiedPayload { destination })?;
        }
        Ok(())
    }

    fn transformed(&mut self, event: &Transformed<'_>) -> anyhow::Result<()> {
        if self.implements(Callback::Transformed) {
            self.call(Callback::Transformed, event)?;
        }
        Ok(())
    }

    fn done(&mut self) -> anyhow::Result<()> {
        if self.implements(Callback::Done) {
            self.call(Callback::Done, &json!({}))?;
        }
        Ok(())
    }
}

/// Spawn the script for one event, feed it the payload and collect stdout.
fn run(path: &Path, event: &str, payload: &impl Serialize) -> Result<Vec<u8>, ScriptError> {
    let input = serde_json::to_vec(payload).map_err(|source| ScriptError::Payload {
        path: path.to_path_buf(),
        source,
    })?;

    let mut child = Command::new(path)
        .arg(event)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ScriptError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

    // Feed stdin from a separate thread so a chatty script cannot deadlock us
    let stdin = child.stdin.take();
    let writer = std::thread::spawn(move || {
        if let Some(mut stdin) = stdin {
            // A script that ignores its input closes the pipe early
            let _ = stdin.write_all(&input);
        }
    });

    let output = child.wait_with_output().map_err(|source| ScriptError::Spawn {
        path: path.to_path_buf(),
        source,
    })?;
    let _ = writer.join();

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(ScriptError::NonZeroExit {
            path: path.to_path_buf(),
            event: event.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }
    if !stderr.is_empty() {
        tracing::debug!("{} {}: {}", path.display(), event, stderr);
    }

    Ok(output.stdout)
}

fn parse_json<T: for<'de> Deserialize<'de>>(
    path: &Path,
    event: &str,
    stdout: &[u8],
) -> Result<T, ScriptError> {
    serde_json::from_slice(stdout).map_err(|e| ScriptError::InvalidOutput {
        path: path.to_path_buf(),
        event: event.to_string(),
        message: e.to_string(),
    })
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

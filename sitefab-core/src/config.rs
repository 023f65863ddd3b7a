//! Configuration parsing and management.

use crate::models::ViewModel;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when no config is named
pub const DEFAULT_CONFIG_FILE: &str = "sitefab.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Build configuration matching the sitefab.yml schema.
///
/// Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source tree to build
    pub folder: PathBuf,

    /// Output root
    pub destination: PathBuf,

    /// Folder of hook scripts, loaded in sorted order
    pub scripts: Option<PathBuf>,

    /// Port for the preview server
    pub port: u16,

    /// Extension markdown sources are written with
    pub output_extension: String,

    /// Extra extensions rendered as markup templates
    pub markup_extensions: Vec<String>,

    /// Extra extensions rendered as markdown
    pub markdown_extensions: Vec<String>,

    /// Values merged into every view-model, winning over everything else
    pub locals: ViewModel,

    /// Stop a build at the first failing file
    pub fail_fast: bool,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("./www"),
            destination: PathBuf::from("./dist"),
            scripts: None,
            port: 3001,
            output_extension: crate::render::DEFAULT_OUTPUT_EXTENSION.to_string(),
            markup_extensions: Vec::new(),
            markdown_extensions: Vec::new(),
            locals: ViewModel::new(),
            fail_fast: false,
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?
        };

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Load the named config file, or `sitefab.yml` if it exists.
    ///
    /// A missing default file yields the defaults; a missing named file is
    /// an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Where the config was read from, if anywhere
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Source folder, resolved relative to the config file
    pub fn folder_dir(&self) -> PathBuf {
        self.resolve_path(&self.folder)
    }

    /// Destination folder, resolved relative to the config file
    pub fn destination_dir(&self) -> PathBuf {
        self.resolve_path(&self.destination)
    }

    /// Scripts folder, resolved relative to the config file
    pub fn scripts_dir(&self) -> Option<PathBuf> {
        self.scripts.as_ref().map(|p| self.resolve_path(p))
    }

    /// Options handed to hook scripts when they load
    pub fn to_options(&self) -> ViewModel {
        let mut options = ViewModel::new();
        options.insert("folder".into(), json!(self.folder_dir().display().to_string()));
        options.insert(
            "destination".into(),
            json!(self.destination_dir().display().to_string()),
        );
        if let Some(scripts) = self.scripts_dir() {
            options.insert("scripts".into(), json!(scripts.display().to_string()));
        }
        options.insert("port".into(), json!(self.port));
        options.insert("outputExtension".into(), json!(self.output_extension));
        options.insert("locals".into(), serde_json::Value::Object(self.locals.clone()));
        options
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(parent) = self.config_path.as_deref().and_then(Path::parent) {
            parent.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

//! Data model shared by every pipeline stage: file entries, view-models and run reports.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Open key/value record handed to the template engine.
///
/// Keys are assembled incrementally: extracted metadata first, then hook
/// contributions, then configured locals. Later merges overwrite earlier keys.
pub type ViewModel = Map<String, Value>;

/// Well-known OS metadata file that is never copied.
pub const OS_METADATA_FILE: &str = ".DS_Store";

/// A single entry discovered by the tree walker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// File name including extension
    pub name: String,

    /// Containing directory
    pub dir: PathBuf,

    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl FileEntry {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>, is_dir: bool) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            is_dir,
        }
    }

    /// Full path of the entry
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Lower-cased extension without the leading dot
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Containing directory relative to `root` (empty when outside of it)
    pub fn relative_dir(&self, root: &Path) -> PathBuf {
        self.dir
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Entry path relative to `root`, with `/` separators and no leading slash
    pub fn relative_path(&self, root: &Path) -> String {
        let rel = self.relative_dir(root).join(&self.name);
        to_slash(&rel)
    }

    /// Whether the entry lives under a `layouts` or `partials` directory
    /// (case-insensitive) below `root`.
    pub fn is_layout_or_partial(&self, root: &Path) -> bool {
        self.relative_dir(root).components().any(|c| {
            let segment = c.as_os_str().to_string_lossy().to_lowercase();
            segment == "layouts" || segment == "partials"
        })
    }

    /// Whether this is the OS metadata file that copies skip
    pub fn is_os_metadata(&self) -> bool {
        self.name == OS_METADATA_FILE
    }
}

/// Join path components with `/` regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .filter(|c| c != "/" && !c.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Result of a single render: the text and the view-model it was rendered with
#[derive(Debug, Clone)]
pub struct Rendered {
    pub text: String,
    pub view_model: ViewModel,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Output paths of rendered files, in processing order
    pub rendered: Vec<PathBuf>,

    /// Output paths of verbatim copies, in processing order
    pub copied: Vec<PathBuf>,

    /// Names of registered partials and layouts
    pub partials: Vec<String>,
}

/// Merge `overlay` into `base`; overlay keys win.
pub fn merge_into(base: &mut ViewModel, overlay: ViewModel) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

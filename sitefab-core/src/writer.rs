//! Output side of the pipeline: writing rendered text and copying raw files.
//!
//! Destination paths mirror the source tree. Writes overwrite whatever is
//! already there, so re-running a build is the way to recover from a partial
//! one.

use crate::models::FileEntry;
use crate::walker::walk;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WriteError {
    pub(crate) fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Trim leading whitespace from every line.
pub fn normalize_whitespace(text: &str) -> String {
    text.split('\n')
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Directory under `destination_root` that mirrors the entry's directory
pub fn destination_dir(entry: &FileEntry, source_root: &Path, destination_root: &Path) -> PathBuf {
    destination_root.join(entry.relative_dir(source_root))
}

/// Write rendered text into `destination_dir` under `file_name`.
///
/// The directory is created if needed. Returns the written path and the
/// normalized text that went into it.
pub fn write_rendered(
    destination_dir: &Path,
    file_name: &str,
    text: &str,
) -> Result<(PathBuf, String), WriteError> {
    fs::create_dir_all(destination_dir).map_err(|e| WriteError::new(destination_dir, e))?;
    let path = destination_dir.join(file_name);
    let normalized = normalize_whitespace(text);
    tracing::debug!("Creating {}", path.display());
    fs::write(&path, &normalized).map_err(|e| WriteError::new(&path, e))?;
    Ok((path, normalized))
}

/// Copy an entry verbatim below `destination_root`.
///
/// A directory entry is copied with all of its contents. OS metadata files
/// and anything under a layouts or partials directory are skipped.
/// `on_copied` runs once per copied file, after its bytes are written.
/// Returns the destination paths in copy order.
pub fn copy_entry(
    entry: &FileEntry,
    source_root: &Path,
    destination_root: &Path,
    on_copied: &mut dyn FnMut(&Path),
) -> Result<Vec<PathBuf>, WriteError> {
    if entry.is_dir {
        let mut copied = Vec::new();
        for child in walk(entry.path()) {
            copied.extend(copy_entry(&child, source_root, destination_root, on_copied)?);
        }
        return Ok(copied);
    }

    if entry.is_os_metadata() || entry.is_layout_or_partial(source_root) {
        tracing::debug!("Skipping {}", entry.path().display());
        return Ok(Vec::new());
    }

    let dir = destination_dir(entry, source_root, destination_root);
    let destination = dir.join(&entry.name);
    copy_file(&entry.path(), &destination)?;
    on_copied(&destination);
    Ok(vec![destination])
}

/// Stream the bytes of `source` into `destination`, creating parent
/// directories as needed.
pub fn copy_file(source: &Path, destination: &Path) -> Result<u64, WriteError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| WriteError::new(parent, e))?;
    }
    let input = File::open(source).map_err(|e| WriteError::new(source, e))?;
    let output = File::create(destination).map_err(|e| WriteError::new(destination, e))?;

    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);
    let bytes = io::copy(&mut reader, &mut writer).map_err(|e| WriteError::new(destination, e))?;
    writer
        .into_inner()
        .map_err(|e| WriteError::new(destination, e.into_error()))?;
    tracing::debug!("Copied {} to {}", source.display(), destination.display());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_leading_whitespace_only() {
        let text = "<div>\n    <p>hi</p>  \n\t\t<span>x</span>\n</div>";
        assert_eq!(normalize_whitespace(text), "<div>\n<p>hi</p>  \n<span>x</span>\n</div>");
    }

    #[test]
    fn test_write_rendered_creates_directories_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dist/posts");

        let (path, text) = write_rendered(&target, "a.html", "  <p>one</p>").unwrap();
        assert_eq!(path, target.join("a.html"));
        assert_eq!(text, "<p>one</p>");

        // Existing directory and file are fine
        write_rendered(&target, "a.html", "<p>two</p>").unwrap();
        assert_eq!(fs::read_to_string(target.join("a.html")).unwrap(), "<p>two</p>");
    }

    #[test]
    fn test_copy_directory_entry_preserves_structure() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("www");
        let dest = dir.path().join("dist");
        fs::create_dir_all(src.join("assets/img")).unwrap();
        fs::create_dir_all(src.join("layouts")).unwrap();
        fs::write(src.join("assets/img/logo.png"), [0u8, 159, 146, 150]).unwrap();
        fs::write(src.join("assets/.DS_Store"), "junk").unwrap();
        fs::write(src.join("layouts/base.html"), "layout").unwrap();

        let mut seen = Vec::new();
        let copied = copy_entry(
            &FileEntry::new(&src, "assets", true),
            &src,
            &dest,
            &mut |p: &Path| seen.push(p.to_path_buf()),
        )
        .unwrap();

        assert_eq!(copied, vec![dest.join("assets/img/logo.png")]);
        assert_eq!(seen, copied);
        assert_eq!(fs::read(dest.join("assets/img/logo.png")).unwrap(), vec![0u8, 159, 146, 150]);
        assert!(!dest.join("assets/.DS_Store").exists());

        let skipped = copy_entry(
            &FileEntry::new(src.join("layouts"), "base.html", false),
            &src,
            &dest,
            &mut |_: &Path| {},
        )
        .unwrap();
        assert!(skipped.is_empty());
        assert!(!dest.join("layouts").exists());
    }
}

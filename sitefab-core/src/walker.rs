//! Lazy recursive enumeration of the files under a root directory.

use crate::models::FileEntry;
use std::path::Path;
use walkdir::WalkDir;

/// Walk every file below `root`, depth-first.
///
/// Directories are recursed into but not yielded. Entries within a directory
/// come out in file-name order so that runs are reproducible. The walk
/// re-reads the filesystem on every call.
pub fn walk(root: impl AsRef<Path>) -> Walk {
    Walk {
        inner: WalkDir::new(root.as_ref())
            .min_depth(1)
            .sort_by_file_name()
            .into_iter(),
    }
}

/// Iterator returned by [`walk`]
pub struct Walk {
    inner: walkdir::IntoIter,
}

impl Iterator for Walk {
    type Item = FileEntry;

    fn next(&mut self) -> Option<FileEntry> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        continue;
                    }
                    let dir = entry
                        .path()
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    let name = entry.file_name().to_string_lossy().into_owned();
                    return Some(FileEntry::new(dir, name, false));
                }
                Err(err) => {
                    // An unreadable directory only loses its own subtree
                    let path = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    tracing::warn!("Failed to read {}: {}", path, err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_walk_recurses_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("index.md"), "x").unwrap();
        fs::write(root.join("a/one.html"), "x").unwrap();
        fs::write(root.join("a/b/two.png"), "x").unwrap();

        let entries: Vec<FileEntry> = walk(root).collect();
        let rel: Vec<String> = entries.iter().map(|e| e.relative_path(root)).collect();

        assert_eq!(rel, vec!["a/b/two.png", "a/one.html", "index.md"]);
        assert!(entries.iter().all(|e| !e.is_dir));
        assert_eq!(entries[0].dir, root.join("a/b"));
    }

    #[test]
    fn test_walk_missing_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<FileEntry> = walk(dir.path().join("missing")).collect();
        assert!(entries.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_loses_only_its_subtree() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::create_dir_all(root.join("open")).unwrap();
        fs::write(root.join("locked/secret.md"), "x").unwrap();
        fs::write(root.join("open/page.md"), "x").unwrap();
        fs::write(root.join("z.md"), "x").unwrap();

        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Permission bits do not stop root
        let readable = fs::read_dir(&locked).is_ok();

        let rel: Vec<String> = walk(root).map(|e| e.relative_path(root)).collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if readable {
            assert_eq!(rel, vec!["locked/secret.md", "open/page.md", "z.md"]);
        } else {
            assert_eq!(rel, vec!["open/page.md", "z.md"]);
        }
    }

    #[test]
    fn test_walk_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        assert_eq!(walk(dir.path()).count(), 1);

        fs::write(dir.path().join("b.txt"), "x").unwrap();
        assert_eq!(walk(dir.path()).count(), 2);
    }
}

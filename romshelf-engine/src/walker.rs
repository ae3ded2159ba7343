//! Directory walker for game-file collections.
//!
//! Wraps `walkdir` into a lazy, restartable sequence of [`FileDescriptor`]s
//! filtered by a recognized-extension set. Symlinks are followed with cycle
//! detection; unreadable entries are skipped with a recorded warning rather
//! than failing the walk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use romshelf_core::{FileDescriptor, ScanError};

/// A restartable walker over one scan root. Each call to [`iter`](Self::iter)
/// starts a fresh traversal.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    extensions: HashSet<String>,
}

impl DirectoryWalker {
    /// Build a walker for `root` matching the given extensions
    /// (case-insensitive, no leading dot).
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Start a traversal. Fails only when the root is missing or not a
    /// directory; everything below that is per-entry and non-fatal.
    pub fn iter(&self) -> Result<Walk, ScanError> {
        let meta = std::fs::metadata(&self.root)
            .map_err(|_| ScanError::invalid_root(&self.root, "does not exist"))?;
        if !meta.is_dir() {
            return Err(ScanError::invalid_root(&self.root, "not a directory"));
        }

        Ok(Walk {
            inner: walkdir::WalkDir::new(&self.root).follow_links(true).into_iter(),
            extensions: self.extensions.clone(),
            visited: HashSet::new(),
            warnings: Vec::new(),
        })
    }
}

/// One in-progress traversal. Ordering of yielded files is unspecified;
/// consumers must not rely on path order.
#[derive(Debug)]
pub struct Walk {
    inner: walkdir::IntoIter,
    extensions: HashSet<String>,
    /// Canonical paths already yielded, so a file reachable through several
    /// symlinked directories is visited at most once.
    visited: HashSet<PathBuf>,
    warnings: Vec<String>,
}

impl Walk {
    /// Drain the warnings recorded so far (unreadable entries, symlink
    /// cycles). Call after iteration to fold them into the scan result.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }
}

impl Iterator for Walk {
    type Item = FileDescriptor;

    fn next(&mut self) -> Option<FileDescriptor> {
        loop {
            let entry = match self.inner.next()? {
                Ok(e) => e,
                Err(e) => {
                    // Permission errors and symlink loops land here.
                    self.warnings.push(format!("skipped during walk: {e}"));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !self.matches_extension(path) {
                continue;
            }

            // walkdir already refuses to loop through ancestor symlinks;
            // the visited set additionally collapses the same real file
            // reached through sibling links.
            let real = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if !self.visited.insert(real) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    self.warnings
                        .push(format!("unreadable metadata for {}: {e}", path.display()));
                    continue;
                }
            };

            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();

            return Some(FileDescriptor {
                path: path.to_path_buf(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                extension,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_walks_matching_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rom"), b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.ROM"), b"b").unwrap();

        let walker = DirectoryWalker::new(dir.path(), &exts(&["rom"]));
        let mut names: Vec<String> = walker
            .iter()
            .unwrap()
            .map(|d| d.display_name())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.rom", "b.ROM"]);
    }

    #[test]
    fn test_extension_match_is_case_insensitive_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.NES"), b"a").unwrap();

        let walker = DirectoryWalker::new(dir.path(), &exts(&["Nes"]));
        let files: Vec<_> = walker.iter().unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].extension, "nes");
    }

    #[test]
    fn test_missing_root_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let walker = DirectoryWalker::new(dir.path().join("gone"), &exts(&["rom"]));
        assert!(matches!(
            walker.iter().unwrap_err(),
            ScanError::InvalidRoot { .. }
        ));
    }

    #[test]
    fn test_file_root_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.rom");
        fs::write(&file, b"x").unwrap();
        let walker = DirectoryWalker::new(&file, &exts(&["rom"]));
        assert!(matches!(
            walker.iter().unwrap_err(),
            ScanError::InvalidRoot { .. }
        ));
    }

    #[test]
    fn test_walk_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rom"), b"a").unwrap();
        let walker = DirectoryWalker::new(dir.path(), &exts(&["rom"]));
        assert_eq!(walker.iter().unwrap().count(), 1);
        assert_eq!(walker.iter().unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped_with_warning() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rom"), b"a").unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("b.rom"), b"b").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // A privileged user reads the directory regardless of its mode;
        // the skip path is unreachable then, so there is nothing to check.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let walker = DirectoryWalker::new(dir.path(), &exts(&["rom"]));
        let mut walk = walker.iter().unwrap();
        let names: Vec<String> = (&mut walk).map(|d| d.display_name()).collect();
        let warnings = walk.take_warnings();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(names, vec!["a.rom"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("skipped during walk"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_visited_once() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.rom");
        fs::write(&target, b"a").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link.rom")).unwrap();

        let walker = DirectoryWalker::new(dir.path(), &exts(&["rom"]));
        assert_eq!(walker.iter().unwrap().count(), 1);
    }
}

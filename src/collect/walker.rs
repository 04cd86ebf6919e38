//! Recursive file enumeration with ignore patterns.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Compiled ignore globs for one source directory.
///
/// A pattern matches an entry when it matches either the entry's path
/// relative to the walked directory or the entry's base name, so `*.md`
/// and `node_modules` both work at any depth.
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    set: GlobSet,
}

impl IgnorePatterns {
    pub fn compile<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut all = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|source| Error::IgnorePattern {
                pattern: pattern.to_string(),
                source,
            })?;
            builder.add(glob);
            all.push(pattern.to_string());
        }
        let set = builder.build().map_err(|source| Error::IgnorePattern {
            pattern: all.join(", "),
            source,
        })?;
        Ok(Self { set })
    }

    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }

    pub fn is_ignored(&self, relative: &Path) -> bool {
        if self.set.is_empty() {
            return false;
        }
        if self.set.is_match(relative) {
            return true;
        }
        relative
            .file_name()
            .is_some_and(|name| self.set.is_match(Path::new(name)))
    }
}

/// Enumerates the regular files below a directory.
///
/// Implementations must be shareable across threads: the collector walks
/// every source directory on its own thread.
pub trait FileWalker: Send + Sync {
    /// Return every file under `dir` not excluded by `ignore`.
    fn walk(&self, dir: &Path, ignore: &IgnorePatterns) -> io::Result<Vec<PathBuf>>;
}

/// [`FileWalker`] backed by `walkdir`.
///
/// Symlinks are not followed. Entries are visited in file-name order so an
/// unchanged tree always enumerates identically.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkDirWalker;

impl FileWalker for WalkDirWalker {
    fn walk(&self, dir: &Path, ignore: &IgnorePatterns) -> io::Result<Vec<PathBuf>> {
        let md = fs::metadata(dir)?;
        if !md.is_dir() {
            return Err(io::Error::other(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let entries = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !ignore.is_ignored(e.path().strip_prefix(dir).unwrap_or(e.path()))
            });

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

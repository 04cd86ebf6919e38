//! Directory collection.
//!
//! Every configured [`SourceDirectory`] is enumerated on its own scoped
//! thread. Results are joined in the order the directories were given, and
//! the first failure in that order is the only error reported. Once any
//! enumeration fails, enumerations that have not started yet are skipped
//! and the results of those still running are discarded.

pub mod walker;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::debug;

use crate::config::SourceDirectory;
use crate::error::{Error, Result};

pub use walker::{FileWalker, IgnorePatterns, WalkDirWalker};

/// A file found under a source directory, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileRecord {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Absolute path of the source directory it was found under.
    pub owner: PathBuf,
    pub package_path: String,
}

struct Job<'a> {
    source: &'a SourceDirectory,
    root: PathBuf,
    ignore: IgnorePatterns,
}

/// Enumerate all source directories and tag every file with its owner.
///
/// `global_ignore` is applied to every directory in addition to the
/// directory's own patterns. All patterns are compiled before any
/// enumeration starts.
pub fn collect_sources(
    walker: &dyn FileWalker,
    dirs: &[SourceDirectory],
    global_ignore: &[String],
) -> Result<Vec<RawFileRecord>> {
    let jobs = dirs
        .iter()
        .map(|source| {
            let root =
                std::path::absolute(&source.path).map_err(|e| Error::Enumeration {
                    dir: source.path.clone(),
                    source: e,
                })?;
            let ignore = IgnorePatterns::compile(global_ignore.iter().chain(&source.ignore))?;
            Ok(Job {
                source,
                root,
                ignore,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let aborted = AtomicBool::new(false);
    let results: Vec<Option<io::Result<Vec<PathBuf>>>> = thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .iter()
            .map(|job| {
                let aborted = &aborted;
                scope.spawn(move || {
                    if aborted.load(Ordering::Acquire) {
                        return None;
                    }
                    debug!(
                        "Adding directory \"{}\" (at \"{}\")",
                        job.root.display(),
                        job.source.package_path
                    );
                    let result = walker.walk(&job.root, &job.ignore);
                    if result.is_err() {
                        aborted.store(true, Ordering::Release);
                    }
                    Some(result)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    let mut records = Vec::new();
    for (job, result) in jobs.iter().zip(results) {
        // Skipped jobs only exist when some job failed; that failure is
        // returned when the loop reaches it.
        let Some(result) = result else {
            continue;
        };
        let files = result.map_err(|e| Error::Enumeration {
            dir: job.source.path.clone(),
            source: e,
        })?;
        debug!("{} files in \"{}\"", files.len(), job.root.display());
        records.extend(files.into_iter().map(|path| RawFileRecord {
            path,
            owner: job.root.clone(),
            package_path: job.source.package_path.clone(),
        }));
    }
    Ok(records)
}

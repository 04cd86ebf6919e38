//! Error types for bundle assembly and kernel resolution.
//!
//! Every fatal condition of a run maps to exactly one variant. Nothing in
//! this crate retries; callers get the first failure and decide.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::kernel::fetch::FetchError;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The walker failed while enumerating a source directory.
    #[error("failed to enumerate directory {}: {source}", dir.display())]
    Enumeration {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid ignore pattern '{pattern}': {source}")]
    IgnorePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("found two copies of the runtime library at {} and {}", first.display(), second.display())]
    DuplicateDescriptor { first: PathBuf, second: PathBuf },

    /// Descriptor unreadable, not JSON, or lacking `kernelVersion`.
    #[error("unable to read runtime library config {}: {reason}", path.display())]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("source directories do not contain a runtime library descriptor ({descriptor})")]
    MissingDescriptor { descriptor: &'static str },

    #[error("bundle name '{name}' is produced by both {} and {}", first.display(), second.display())]
    BundleNameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to resolve entry point {}: {source}", path.display())]
    EntryPoint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write bundle {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid build config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("kernel cache unavailable: {reason}")]
    CacheRoot { reason: String },

    #[error("invalid kernel version '{version}': must be a single file name segment")]
    InvalidVersion { version: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

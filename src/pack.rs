//! The `pack` pipeline: collect, build the manifest, emit.

use std::path::PathBuf;
use tracing::info;

use crate::artifact::{emit_bundle, BundleSummary, BundleWriter};
use crate::collect::{collect_sources, FileWalker};
use crate::config::{SourceDirectory, DEFAULT_APP_ENTRY, DEFAULT_IGNORE, DEFAULT_OUTPUT};
use crate::error::Result;
use crate::manifest::{build_manifest, Bundle, BundleEntry};

/// Inputs of one assembly run.
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub dirs: Vec<SourceDirectory>,
    pub output: PathBuf,
    /// Explicit system entry; replaces the loader found next to the descriptor.
    pub system_entry: Option<String>,
    /// Application entry handed to the writer; `/` when absent.
    pub app_entry: Option<String>,
    /// Patterns applied to every directory.
    pub ignore: Vec<String>,
    /// Only list the files that would be packed.
    pub list_only: bool,
}

impl PackOptions {
    pub fn new(dirs: Vec<SourceDirectory>) -> Self {
        Self {
            dirs,
            output: PathBuf::from(DEFAULT_OUTPUT),
            system_entry: None,
            app_entry: None,
            ignore: DEFAULT_IGNORE.iter().map(|p| p.to_string()).collect(),
            list_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PackOutcome {
    /// Listing mode: the entries that would have been packed.
    Listed(Vec<BundleEntry>),
    Built {
        bundle: Bundle,
        summary: BundleSummary,
    },
}

/// Assemble an initrd bundle.
///
/// In listing mode the full scan still runs, so duplicate or invalid
/// descriptors and name collisions are reported, but a missing descriptor
/// is not an error and nothing is written.
pub fn pack(
    options: &PackOptions,
    walker: &dyn FileWalker,
    writer: &dyn BundleWriter,
) -> Result<PackOutcome> {
    let records = collect_sources(walker, &options.dirs, &options.ignore)?;
    let manifest = build_manifest(&records, options.system_entry.as_deref())?;

    if options.list_only {
        return Ok(PackOutcome::Listed(manifest.entries));
    }

    let app_entry = options.app_entry.as_deref().unwrap_or(DEFAULT_APP_ENTRY);
    let (bundle, core) = manifest.into_bundle(app_entry)?;
    info!(
        "Packing {} files for kernel {} (entry \"{}\")",
        bundle.entries.len(),
        core.kernel_version,
        bundle.index_name
    );

    let summary = emit_bundle(writer, &bundle, &core, &options.output)?;
    Ok(PackOutcome::Built { bundle, summary })
}

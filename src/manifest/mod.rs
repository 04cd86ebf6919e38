//! Bundle manifest construction.
//!
//! A single pass over the collected [`RawFileRecord`]s both builds the list
//! of bundle entries and locates the runtime library descriptor:
//!
//! - hidden files (base name starting with `.`) are dropped silently
//! - a descriptor is parsed, validated and also kept as ordinary content
//! - every other file becomes a [`BundleEntry`]
//!
//! Two descriptors, an invalid descriptor, or two files mapping to the same
//! bundle name fail the pass immediately. A missing descriptor is only
//! detected once the pass is complete, by [`Manifest::into_bundle`].

pub mod descriptor;
pub mod paths;

use std::collections::hash_map::{Entry, HashMap};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::collect::RawFileRecord;
use crate::error::{Error, Result};

pub use descriptor::{CoreConfig, EntryPoint, KernelVersion, ResolvedCore, DESCRIPTOR_FILENAME};
pub use paths::PathStyle;

/// Leading character of hidden file names.
pub const HIDDEN_PREFIX: char = '.';

/// A file addressable inside the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    /// Absolute path of the file on disk.
    pub source: PathBuf,
    /// Path relative to the owning source directory, in host form.
    pub relative_path: PathBuf,
    /// Name inside the bundle: package path joined with the `/`-form relative path.
    pub name: String,
}

/// Assembled manifest ready for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub entries: Vec<BundleEntry>,
    /// Bundle name of the system entry point.
    pub index_name: String,
    /// Application entry handed through to the image.
    pub app_index_name: String,
}

/// Result of a full scan, before the descriptor requirement is enforced.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub entries: Vec<BundleEntry>,
    pub core: Option<ResolvedCore>,
}

impl Manifest {
    /// Require a descriptor and produce the bundle plus its core config.
    pub fn into_bundle(self, app_index_name: &str) -> Result<(Bundle, CoreConfig)> {
        let core = self.core.ok_or(Error::MissingDescriptor {
            descriptor: DESCRIPTOR_FILENAME,
        })?;
        let bundle = Bundle {
            entries: self.entries,
            index_name: core.entry.bundle_name,
            app_index_name: app_index_name.to_string(),
        };
        Ok((bundle, core.config))
    }
}

/// Incremental manifest builder.
#[derive(Debug)]
pub struct ManifestBuilder<'a> {
    system_entry: Option<&'a str>,
    style: PathStyle,
    entries: Vec<BundleEntry>,
    names: HashMap<String, usize>,
    core: Option<ResolvedCore>,
}

impl<'a> ManifestBuilder<'a> {
    /// `system_entry` overrides the loader derived from the descriptor.
    pub fn new(system_entry: Option<&'a str>) -> Self {
        Self {
            system_entry,
            style: PathStyle::host(),
            entries: Vec::new(),
            names: HashMap::new(),
            core: None,
        }
    }

    pub fn with_path_style(mut self, style: PathStyle) -> Self {
        self.style = style;
        self
    }

    pub fn add(&mut self, record: &RawFileRecord) -> Result<()> {
        let Some(base_name) = record.path.file_name().map(|n| n.to_string_lossy()) else {
            return Ok(());
        };
        if base_name.starts_with(HIDDEN_PREFIX) {
            return Ok(());
        }
        if base_name == DESCRIPTOR_FILENAME {
            self.accept_descriptor(record)?;
        }

        let relative_path = paths::relative_to(&record.path, &record.owner).to_path_buf();
        let name = paths::join_bundle_name(
            &record.package_path,
            &self.style.normalize(&relative_path.to_string_lossy()),
        );

        match self.names.entry(name) {
            Entry::Occupied(existing) => Err(Error::BundleNameCollision {
                name: existing.key().clone(),
                first: self.entries[*existing.get()].source.clone(),
                second: record.path.clone(),
            }),
            Entry::Vacant(slot) => {
                let name = slot.key().clone();
                slot.insert(self.entries.len());
                self.entries.push(BundleEntry {
                    source: record.path.clone(),
                    relative_path,
                    name,
                });
                Ok(())
            }
        }
    }

    fn accept_descriptor(&mut self, record: &RawFileRecord) -> Result<()> {
        let library_dir = record
            .path
            .parent()
            .unwrap_or(&record.owner)
            .to_path_buf();

        if let Some(core) = &self.core {
            return Err(Error::DuplicateDescriptor {
                first: core.library_dir.clone(),
                second: library_dir,
            });
        }

        let config = CoreConfig::load(&record.path)?;
        let entry = match self.system_entry {
            Some(system_entry) => EntryPoint::explicit(system_entry)?,
            None => EntryPoint::from_descriptor(
                &record.path,
                &record.owner,
                &record.package_path,
                self.style,
            ),
        };

        debug!("System entry point \"{}\"", entry.bundle_name);
        if !entry.path.is_file() {
            warn!(
                "System entry point {} does not exist on disk",
                entry.path.display()
            );
        }

        self.core = Some(ResolvedCore {
            config,
            library_dir,
            entry,
        });
        Ok(())
    }

    pub fn finish(self) -> Manifest {
        Manifest {
            entries: self.entries,
            core: self.core,
        }
    }
}

/// Run the builder over every record.
pub fn build_manifest(records: &[RawFileRecord], system_entry: Option<&str>) -> Result<Manifest> {
    let mut builder = ManifestBuilder::new(system_entry);
    for record in records {
        builder.add(record)?;
    }
    Ok(builder.finish())
}

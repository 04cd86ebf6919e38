//! Default initrd bundle format: a zstd-compressed tar stream.
//!
//! Layout:
//! - `.initrd.json` first, describing the bundle ([`InitrdMetadata`])
//! - every manifest entry in manifest order, stored under its bundle name
//!   with any leading `/` removed
//!
//! Headers are deterministic (mtime 0, uid/gid 0) so an unchanged input
//! tree produces an identical archive.

use serde::{Deserialize, Serialize};
use std::fs::{File, Metadata};
use std::io::{self, Write};
use std::path::Path;

use super::BundleWriter;
use crate::manifest::{BundleEntry, CoreConfig};

/// Name of the metadata member. Bundle names always contain a `/`, so it
/// cannot clash with a file.
pub const METADATA_ENTRY: &str = ".initrd.json";

pub const FORMAT_VERSION: u32 = 1;

pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Contents of the `.initrd.json` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitrdMetadata {
    pub format: u32,
    pub core_config: CoreConfig,
    pub index_name: String,
    pub app_index_name: String,
    /// Bundle names in archive order.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct InitrdWriter {
    level: i32,
}

impl InitrdWriter {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for InitrdWriter {
    fn default() -> Self {
        Self::new(DEFAULT_ZSTD_LEVEL)
    }
}

impl BundleWriter for InitrdWriter {
    fn write_bundle(
        &self,
        out: &mut dyn Write,
        entries: &[BundleEntry],
        core: &CoreConfig,
        index_name: &str,
        app_index_name: &str,
    ) -> io::Result<()> {
        let encoder = zstd::stream::Encoder::new(out, self.level)?;
        let mut builder = tar::Builder::new(encoder);

        let metadata = InitrdMetadata {
            format: FORMAT_VERSION,
            core_config: core.clone(),
            index_name: index_name.to_string(),
            app_index_name: app_index_name.to_string(),
            files: entries.iter().map(|e| e.name.clone()).collect(),
        };
        let json = serde_json::to_vec_pretty(&metadata)?;
        let mut header = regular_header(json.len() as u64, 0o644);
        builder.append_data(&mut header, METADATA_ENTRY, json.as_slice())?;

        for entry in entries {
            let mut f = File::open(&entry.source).map_err(|e| with_path(e, &entry.source))?;
            let md = f.metadata().map_err(|e| with_path(e, &entry.source))?;
            let mut header = regular_header(md.len(), file_mode(&md));
            builder
                .append_data(&mut header, member_path(&entry.name), &mut f)
                .map_err(|e| with_path(e, &entry.source))?;
        }

        let encoder = builder.into_inner()?;
        encoder.finish()?;
        Ok(())
    }
}

fn member_path(name: &str) -> &str {
    name.trim_start_matches('/')
}

fn regular_header(size: u64, mode: u32) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(size);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode);
    header.set_cksum();
    header
}

#[cfg(unix)]
fn file_mode(md: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    md.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_md: &Metadata) -> u32 {
    0o644
}

fn with_path(e: io::Error, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {e}", path.display()))
}

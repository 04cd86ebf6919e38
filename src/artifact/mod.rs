//! Bundle emission.
//!
//! [`emit_bundle`] opens the output file and hands it to a [`BundleWriter`]
//! together with the manifest, the descriptor and the two entry names. The
//! byte format belongs entirely to the writer; [`initrd::InitrdWriter`] is
//! the one shipped with this crate.
//!
//! A failed write leaves whatever was written so far in place. The output
//! file is only meaningful when [`emit_bundle`] returns `Ok`.

pub mod initrd;

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::manifest::{Bundle, BundleEntry, CoreConfig};

pub use initrd::InitrdWriter;

/// Serializes a manifest and file contents into an output stream.
pub trait BundleWriter {
    fn write_bundle(
        &self,
        out: &mut dyn Write,
        entries: &[BundleEntry],
        core: &CoreConfig,
        index_name: &str,
        app_index_name: &str,
    ) -> io::Result<()>;
}

/// What was written by a successful [`emit_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub output: PathBuf,
    pub entries: usize,
    pub index_name: String,
    pub app_index_name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Write `bundle` to `output` through `writer`.
///
/// Returns only after the file has been flushed and synced.
pub fn emit_bundle(
    writer: &dyn BundleWriter,
    bundle: &Bundle,
    core: &CoreConfig,
    output: &Path,
) -> Result<BundleSummary> {
    let write_err = |source: io::Error| Error::Write {
        path: output.to_path_buf(),
        source,
    };

    let output = std::path::absolute(output).map_err(write_err)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let file = File::create(&output).map_err(write_err)?;
    let mut out = HashingWriter::new(BufWriter::new(file));
    writer
        .write_bundle(
            &mut out,
            &bundle.entries,
            core,
            &bundle.index_name,
            &bundle.app_index_name,
        )
        .map_err(write_err)?;
    let (buffered, sha256, size_bytes) = out.finish();
    let file = buffered.into_inner().map_err(|e| write_err(e.into_error()))?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    info!(
        "Wrote {} ({} entries, {} bytes)",
        output.display(),
        bundle.entries.len(),
        size_bytes
    );

    Ok(BundleSummary {
        output,
        entries: bundle.entries.len(),
        index_name: bundle.index_name.clone(),
        app_index_name: bundle.app_index_name.clone(),
        size_bytes,
        sha256,
    })
}

/// Digests and counts everything written through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    fn finish(self) -> (W, String, u64) {
        (self.inner, format!("{:x}", self.hasher.finalize()), self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingWriter;

    impl BundleWriter for FailingWriter {
        fn write_bundle(
            &self,
            out: &mut dyn Write,
            _entries: &[BundleEntry],
            _core: &CoreConfig,
            _index_name: &str,
            _app_index_name: &str,
        ) -> io::Result<()> {
            out.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    struct PlainWriter;

    impl BundleWriter for PlainWriter {
        fn write_bundle(
            &self,
            out: &mut dyn Write,
            entries: &[BundleEntry],
            core: &CoreConfig,
            index_name: &str,
            app_index_name: &str,
        ) -> io::Result<()> {
            writeln!(out, "{} {} {}", core.kernel_version, index_name, app_index_name)?;
            for entry in entries {
                writeln!(out, "{}", entry.name)?;
            }
            Ok(())
        }
    }

    fn sample() -> (Bundle, CoreConfig) {
        let bundle = Bundle {
            entries: vec![BundleEntry {
                source: PathBuf::from("/a/js/__loader.js"),
                relative_path: PathBuf::from("js/__loader.js"),
                name: "core/js/__loader.js".to_string(),
            }],
            index_name: "core/js/__loader.js".to_string(),
            app_index_name: "/".to_string(),
        };
        let core = CoreConfig {
            kernel_version: "1.2.0".into(),
            extra: Default::default(),
        };
        (bundle, core)
    }

    #[test]
    fn test_emit_reports_summary() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out/.initrd");
        let (bundle, core) = sample();

        let summary = emit_bundle(&PlainWriter, &bundle, &core, &output).unwrap();
        let written = fs::read_to_string(&output).unwrap();
        assert_eq!(written, "1.2.0 core/js/__loader.js /\ncore/js/__loader.js\n");
        assert_eq!(summary.output, output);
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.size_bytes, written.len() as u64);
        assert_eq!(
            summary.sha256,
            format!("{:x}", Sha256::digest(written.as_bytes()))
        );
        assert_eq!(summary.index_name, "core/js/__loader.js");
    }

    #[test]
    fn test_write_failure_is_surfaced_verbatim() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join(".initrd");
        let (bundle, core) = sample();

        let err = emit_bundle(&FailingWriter, &bundle, &core, &output).unwrap_err();
        match err {
            Error::Write { path, source } => {
                assert_eq!(path, output);
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

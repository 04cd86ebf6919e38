//! Runtime library descriptor and boot entry point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::paths::{bundle_name, PathStyle};

/// File name of the runtime library descriptor.
pub const DESCRIPTOR_FILENAME: &str = "runtimecorelib.json";

/// Loader location relative to the descriptor's directory.
pub const LOADER_DIR: &str = "js";
pub const LOADER_FILENAME: &str = "__loader.js";

/// The descriptor's `kernelVersion`, kept as the raw JSON value.
///
/// Strings and numbers are both accepted. The value counts as present unless
/// it is absent, `null`, `false`, `0` or the empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KernelVersion(pub serde_json::Value);

impl KernelVersion {
    pub fn is_present(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => false,
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            serde_json::Value::String(s) => !s.is_empty(),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
        }
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

impl From<&str> for KernelVersion {
    fn from(s: &str) -> Self {
        KernelVersion(serde_json::Value::String(s.to_string()))
    }
}

impl PartialEq<&str> for KernelVersion {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_str() == Some(*other)
    }
}

/// Parsed runtime library descriptor.
///
/// Only `kernelVersion` is interpreted; every other field is carried
/// through untouched so the bundle writer can embed the full descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(rename = "kernelVersion", default)]
    pub kernel_version: KernelVersion,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CoreConfig {
    /// Read and validate a descriptor file.
    ///
    /// Unreadable files, malformed JSON and a missing `kernelVersion` are
    /// all reported as [`Error::InvalidDescriptor`].
    pub fn load(path: &Path) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidDescriptor {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = fs::read(path).map_err(|e| invalid(e.to_string()))?;
        let config: CoreConfig =
            serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
        if !config.kernel_version.is_present() {
            return Err(invalid("kernelVersion is missing".to_string()));
        }
        Ok(config)
    }
}

/// Code executed first when the assembled image boots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Absolute filesystem location.
    pub path: PathBuf,
    /// Name inside the bundle.
    pub bundle_name: String,
}

impl EntryPoint {
    /// Caller-supplied entry. The string is used verbatim as the bundle name.
    pub fn explicit(system_entry: &str) -> Result<Self> {
        let path = std::path::absolute(system_entry).map_err(|source| Error::EntryPoint {
            path: PathBuf::from(system_entry),
            source,
        })?;
        Ok(Self {
            path,
            bundle_name: system_entry.to_string(),
        })
    }

    /// Conventional loader next to the descriptor: `<descriptor dir>/js/__loader.js`.
    pub fn from_descriptor(
        descriptor: &Path,
        owner: &Path,
        package_path: &str,
        style: PathStyle,
    ) -> Self {
        let dir = descriptor.parent().unwrap_or(owner);
        let path = dir.join(LOADER_DIR).join(LOADER_FILENAME);
        let bundle_name = bundle_name(package_path, &path, owner, style);
        Self { path, bundle_name }
    }
}

/// The accepted descriptor of a run together with its derived entry point.
#[derive(Debug, Clone)]
pub struct ResolvedCore {
    pub config: CoreConfig,
    /// Directory holding the accepted descriptor.
    pub library_dir: PathBuf,
    pub entry: EntryPoint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_keeps_extra_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DESCRIPTOR_FILENAME);
        fs::write(&path, r#"{"kernelVersion":"1.2.0","name":"jsos"}"#).unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.kernel_version, "1.2.0");
        assert_eq!(config.extra.get("name").and_then(|v| v.as_str()), Some("jsos"));
    }

    #[test]
    fn test_numeric_and_blank_versions_are_accepted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DESCRIPTOR_FILENAME);

        fs::write(&path, r#"{"kernelVersion":2}"#).unwrap();
        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.kernel_version.to_string(), "2");

        fs::write(&path, r#"{"kernelVersion":"  "}"#).unwrap();
        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.kernel_version, "  ");
    }

    #[test]
    fn test_parse_failure_and_missing_field_are_one_error() {
        let temp = TempDir::new().unwrap();
        let cases = [
            "{not json",
            r#"{"name":"jsos"}"#,
            r#"{"kernelVersion":""}"#,
            r#"{"kernelVersion":null}"#,
            r#"{"kernelVersion":0}"#,
            r#"{"kernelVersion":false}"#,
            "null",
        ];
        for (i, contents) in cases.iter().enumerate() {
            let path = temp.path().join(format!("{i}.json"));
            fs::write(&path, contents).unwrap();
            let err = CoreConfig::load(&path).unwrap_err();
            assert!(
                matches!(err, Error::InvalidDescriptor { path: ref p, .. } if *p == path),
                "contents {contents:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_entry_from_descriptor() {
        let entry = EntryPoint::from_descriptor(
            Path::new("/a/lib/runtimecorelib.json"),
            Path::new("/a"),
            "core",
            PathStyle::Posix,
        );
        assert_eq!(entry.path, PathBuf::from("/a/lib/js/__loader.js"));
        assert_eq!(entry.bundle_name, "core/lib/js/__loader.js");
    }

    #[test]
    fn test_explicit_entry_keeps_caller_string() {
        let entry = EntryPoint::explicit("boot/start.js").unwrap();
        assert!(entry.path.is_absolute());
        assert!(entry.path.ends_with("boot/start.js"));
        assert_eq!(entry.bundle_name, "boot/start.js");
    }
}

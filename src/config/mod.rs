//! Build inputs and the optional `initrd.toml` build-config file.
//!
//! The command line can describe a whole run on its own. The config file only
//! saves retyping the directory list: any value given on the command line
//! overrides the file.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Config file picked up from the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "initrd.toml";

/// Output bundle file name when none is configured.
pub const DEFAULT_OUTPUT: &str = ".initrd";

/// Application entry handed to the writer when none is configured.
pub const DEFAULT_APP_ENTRY: &str = "/";

/// Ignore patterns applied to every source directory.
pub const DEFAULT_IGNORE: &[&str] = &[".git"];

/// Kernel artifact name used in cache file names and URL templates.
pub const DEFAULT_KERNEL_ARTIFACT: &str = "kernel";

/// One configured input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDirectory {
    /// Directory to enumerate.
    pub path: PathBuf,
    /// Prefix under which the directory's files are named inside the bundle.
    pub package_path: String,
    /// Patterns applied to this directory only, on top of the global ones.
    pub ignore: Vec<String>,
}

impl SourceDirectory {
    pub fn new(path: impl Into<PathBuf>, package_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            package_path: package_path.into(),
            ignore: Vec::new(),
        }
    }
}

/// Parses `DIR` or `DIR=PACKAGE_PATH` as given on the command line.
impl FromStr for SourceDirectory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (path, package_path) = match s.split_once('=') {
            Some((path, package_path)) => (path, package_path),
            None => (s, ""),
        };
        if path.trim().is_empty() {
            return Err(format!("missing directory in '{s}'"));
        }
        Ok(SourceDirectory::new(path, package_path))
    }
}

/// Contents of an `initrd.toml` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    pub output: Option<PathBuf>,
    pub entry: Option<String>,
    pub system_entry: Option<String>,
    pub ignore: Option<Vec<String>>,
    #[serde(default, rename = "directory")]
    pub directories: Vec<DirectoryToml>,
    #[serde(default)]
    pub kernel: KernelToml,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryToml {
    pub path: PathBuf,
    #[serde(default)]
    pub package_path: String,
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelToml {
    pub artifact: Option<String>,
    pub url_template: Option<String>,
}

impl BuildConfig {
    /// Load a config file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config: BuildConfig = toml::from_str(&text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for dir in &mut config.directories {
            if dir.path.is_relative() {
                dir.path = base.join(&dir.path);
            }
        }
        if let Some(output) = config.output.as_mut() {
            if output.is_relative() {
                *output = base.join(&*output);
            }
        }
        Ok(config)
    }

    /// Load `--config` when given, else `initrd.toml` in `cwd` if it exists.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Option<Self>> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            return Self::load(&candidate).map(Some);
        }
        Ok(None)
    }

    pub fn source_directories(&self) -> Vec<SourceDirectory> {
        self.directories
            .iter()
            .map(|d| SourceDirectory {
                path: d.path.clone(),
                package_path: d.package_path.clone(),
                ignore: d.ignore.clone(),
            })
            .collect()
    }

    /// Global ignore patterns, falling back to [`DEFAULT_IGNORE`].
    pub fn global_ignore(&self) -> Vec<String> {
        match &self.ignore {
            Some(patterns) => patterns.clone(),
            None => DEFAULT_IGNORE.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Global ignore patterns plus `extra` from the command line.
    ///
    /// Extra patterns add to the configured list; they never replace it.
    pub fn ignore_with(&self, extra: &[String]) -> Vec<String> {
        let mut patterns = self.global_ignore();
        for pattern in extra {
            if !patterns.contains(pattern) {
                patterns.push(pattern.clone());
            }
        }
        patterns
    }
}

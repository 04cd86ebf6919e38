//! Bundle path naming.
//!
//! Bundle names always use `/`. All platform-specific separator handling
//! lives in [`PathStyle`] so the rest of assembly never looks at the host.

use std::path::Path;

/// Separator convention of the platform that produced a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    Posix,
    Windows,
}

impl PathStyle {
    /// Style of the platform this binary was built for.
    pub const fn host() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Posix
        }
    }

    /// Convert a platform path string to forward-slash form.
    pub fn normalize(self, path: &str) -> String {
        match self {
            PathStyle::Posix => path.to_string(),
            PathStyle::Windows => path.replace('\\', "/"),
        }
    }

    /// Environment variable naming the user's home/profile directory.
    pub fn home_env_var(self) -> &'static str {
        match self {
            PathStyle::Posix => "HOME",
            PathStyle::Windows => "USERPROFILE",
        }
    }
}

/// `path` relative to `base`, or `path` unchanged when it lies outside `base`.
pub fn relative_to<'a>(path: &'a Path, base: &Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}

/// Join a package path and a slash-normalized relative path into a bundle name.
pub fn join_bundle_name(package_path: &str, relative: &str) -> String {
    format!("{}/{}", package_path.trim_end_matches('/'), relative)
}

/// Bundle name for `path` found under `owner` in package `package_path`.
pub fn bundle_name(package_path: &str, path: &Path, owner: &Path, style: PathStyle) -> String {
    let relative = relative_to(path, owner).to_string_lossy();
    join_bundle_name(package_path, &style.normalize(&relative))
}

//! Versioned kernel cache.
//!
//! Kernels live under `<base>/.kernel-cache/<artifact>.<version>`. A file at
//! that path is trusted as-is: presence means the kernel is available, and
//! its content is never re-validated. Anything else is fetched through a
//! [`KernelFetcher`], which streams into `<artifact>.<version>.download` and
//! renames into place only when complete.
//!
//! Concurrent runs for the same version serialize on an advisory lock
//! (`<artifact>.<version>.lock`). A stale `.download` left by a crashed
//! run is removed under that lock before the next fetch, never after a
//! failure.
//!
//! The cache directory may therefore hold, per version:
//! - `<artifact>.<version>`: the kernel itself
//! - `<artifact>.<version>.download`: a partial download from a failed run
//! - `<artifact>.<version>.lock`: the lock file, created on the first fetch
//!   and left in place afterwards

pub mod fetch;

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::manifest::PathStyle;

pub use fetch::{FetchError, FetchRequest, HttpFetcher, KernelFetcher};

/// Cache directory name under the chosen base directory.
pub const CACHE_DIR_NAME: &str = ".kernel-cache";

const DOWNLOAD_SUFFIX: &str = "download";
const LOCK_SUFFIX: &str = "lock";

/// Where the cache root lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLocation {
    /// Next to the running executable.
    Local,
    /// In the invoking user's home/profile directory.
    User,
}

impl CacheLocation {
    pub fn from_local_flag(local: bool) -> Self {
        if local {
            CacheLocation::Local
        } else {
            CacheLocation::User
        }
    }
}

/// Base directory for `location`. The cache root is `<base>/.kernel-cache`.
pub fn cache_base(location: CacheLocation, style: PathStyle) -> Result<PathBuf> {
    match location {
        CacheLocation::Local => {
            let exe = std::env::current_exe().map_err(|e| Error::CacheRoot {
                reason: format!("resolving executable path: {e}"),
            })?;
            exe.parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::CacheRoot {
                    reason: format!("executable {} has no parent directory", exe.display()),
                })
        }
        CacheLocation::User => std::env::var_os(style.home_env_var())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .ok_or_else(|| Error::CacheRoot {
                reason: format!(
                    "could not determine home directory (${} is unset)",
                    style.home_env_var()
                ),
            }),
    }
}

/// Kernel cache rooted at `<base>/.kernel-cache`.
#[derive(Debug, Clone)]
pub struct KernelCache {
    root: PathBuf,
    artifact: String,
}

/// Held while a version is being fetched. The lock file itself is never
/// unlinked, so two processes always lock the same inode.
#[derive(Debug)]
struct FetchLock {
    _file: File,
}

impl KernelCache {
    /// Open (and create if needed) the cache under `base`.
    pub fn open(base: &Path, artifact: &str) -> Result<Self> {
        if !is_safe_segment(artifact) {
            return Err(Error::CacheRoot {
                reason: format!("invalid artifact name '{artifact}'"),
            });
        }
        let root = base.join(CACHE_DIR_NAME);
        fs::create_dir_all(&root).map_err(|e| Error::CacheRoot {
            reason: format!("creating {}: {e}", root.display()),
        })?;
        Ok(Self {
            root,
            artifact: artifact.to_string(),
        })
    }

    pub fn for_location(location: CacheLocation, artifact: &str) -> Result<Self> {
        let base = cache_base(location, PathStyle::host())?;
        Self::open(&base, artifact)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, version: &str) -> Result<PathBuf> {
        validate_version(version)?;
        Ok(self.root.join(format!("{}.{}", self.artifact, version)))
    }

    pub fn download_path(&self, version: &str) -> Result<PathBuf> {
        validate_version(version)?;
        Ok(self
            .root
            .join(format!("{}.{}.{}", self.artifact, version, DOWNLOAD_SUFFIX)))
    }

    fn lock_path(&self, version: &str) -> Result<PathBuf> {
        validate_version(version)?;
        Ok(self
            .root
            .join(format!("{}.{}.{}", self.artifact, version, LOCK_SUFFIX)))
    }

    /// Cached path for `version`, if present.
    pub fn lookup(&self, version: &str) -> Result<Option<PathBuf>> {
        let path = self.artifact_path(version)?;
        Ok(path.is_file().then_some(path))
    }

    /// Return the cached kernel for `version`, fetching it first if absent.
    ///
    /// The fetcher's result is returned unchanged; nothing is retried.
    pub fn resolve(
        &self,
        version: &str,
        local: bool,
        fetcher: &dyn KernelFetcher,
    ) -> Result<PathBuf> {
        if let Some(path) = self.lookup(version)? {
            debug!("Using cached kernel {}", path.display());
            return Ok(path);
        }

        let _lock = self.acquire_lock(version)?;

        // Another run may have completed the same fetch while we waited.
        if let Some(path) = self.lookup(version)? {
            debug!("Kernel {} fetched by a concurrent run", version);
            return Ok(path);
        }

        let download_path = self.download_path(version)?;
        if download_path.is_file() {
            info!(
                "Removing incomplete download {}",
                download_path.display()
            );
            fs::remove_file(&download_path).map_err(|source| FetchError::Io {
                path: download_path.clone(),
                source,
            })?;
        }

        let artifact_path = self.artifact_path(version)?;
        let request = FetchRequest {
            version,
            artifact: &self.artifact,
            local,
            download_path: &download_path,
            artifact_path: &artifact_path,
        };
        Ok(fetcher.fetch(&request)?)
    }

    fn acquire_lock(&self, version: &str) -> Result<FetchLock> {
        let lock_path = self.lock_path(version)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::CacheRoot {
                reason: format!("creating lock file {}: {e}", lock_path.display()),
            })?;
        file.lock_exclusive().map_err(|e| Error::CacheRoot {
            reason: format!("locking {}: {e}", lock_path.display()),
        })?;
        Ok(FetchLock { _file: file })
    }
}

fn validate_version(version: &str) -> Result<()> {
    if is_safe_segment(version) {
        Ok(())
    } else {
        Err(Error::InvalidVersion {
            version: version.to_string(),
        })
    }
}

fn is_safe_segment(s: &str) -> bool {
    !s.trim().is_empty() && !s.contains('/') && !s.contains('\\') && !s.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Records each request and writes a fake kernel to the artifact path.
    #[derive(Default)]
    struct FakeFetcher {
        calls: RefCell<Vec<(String, bool)>>,
        saw_stale_download: RefCell<bool>,
        fail: bool,
    }

    impl KernelFetcher for FakeFetcher {
        fn fetch(&self, request: &FetchRequest<'_>) -> std::result::Result<PathBuf, FetchError> {
            self.calls
                .borrow_mut()
                .push((request.version.to_string(), request.local));
            *self.saw_stale_download.borrow_mut() = request.download_path.exists();
            if self.fail {
                fs::write(request.download_path, b"partial").unwrap();
                return Err(FetchError::Status {
                    url: format!("https://example.org/{}", request.version),
                    status: reqwest::StatusCode::NOT_FOUND,
                });
            }
            fs::write(request.artifact_path, b"kernel image").unwrap();
            Ok(request.artifact_path.to_path_buf())
        }
    }

    #[test]
    fn test_fetch_creates_cache_root_and_clears_stale_download() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("home");
        assert!(!base.exists());

        let cache = KernelCache::open(&base, "kernel").unwrap();
        assert!(cache.root().is_dir());
        assert_eq!(cache.root(), base.join(".kernel-cache"));

        fs::write(cache.download_path("9.9.9").unwrap(), b"stale").unwrap();

        let fetcher = FakeFetcher::default();
        let path = cache.resolve("9.9.9", false, &fetcher).unwrap();
        assert_eq!(path, base.join(".kernel-cache/kernel.9.9.9"));
        assert_eq!(fs::read(&path).unwrap(), b"kernel image");
        assert_eq!(*fetcher.calls.borrow(), vec![("9.9.9".to_string(), false)]);
        assert!(!*fetcher.saw_stale_download.borrow());
    }

    #[test]
    fn test_second_resolve_uses_cache() {
        let temp = TempDir::new().unwrap();
        let cache = KernelCache::open(temp.path(), "kernel").unwrap();
        let fetcher = FakeFetcher::default();

        let first = cache.resolve("1.2.0", true, &fetcher).unwrap();
        let second = cache.resolve("1.2.0", true, &fetcher).unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.calls.borrow().len(), 1);
    }

    #[test]
    fn test_lock_file_stays_after_fetch() {
        let temp = TempDir::new().unwrap();
        let cache = KernelCache::open(temp.path(), "kernel").unwrap();
        cache.resolve("4.0.0", false, &FakeFetcher::default()).unwrap();

        let mut names: Vec<String> = fs::read_dir(cache.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["kernel.4.0.0", "kernel.4.0.0.lock"]);
    }

    #[test]
    fn test_present_file_is_trusted() {
        let temp = TempDir::new().unwrap();
        let cache = KernelCache::open(temp.path(), "kernel").unwrap();
        fs::write(cache.artifact_path("2.0.0").unwrap(), b"").unwrap();

        let fetcher = FakeFetcher::default();
        let path = cache.resolve("2.0.0", false, &fetcher).unwrap();
        assert_eq!(path, cache.artifact_path("2.0.0").unwrap());
        assert!(fetcher.calls.borrow().is_empty());
    }

    #[test]
    fn test_fetch_failure_is_returned_unchanged() {
        let temp = TempDir::new().unwrap();
        let cache = KernelCache::open(temp.path(), "kernel").unwrap();
        let fetcher = FakeFetcher {
            fail: true,
            ..Default::default()
        };

        let err = cache.resolve("3.0.0", false, &fetcher).unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(FetchError::Status { status, .. }) if status == reqwest::StatusCode::NOT_FOUND
        ));
        assert!(cache.lookup("3.0.0").unwrap().is_none());
        // The partial download is left for the next run to clean up.
        assert!(cache.download_path("3.0.0").unwrap().exists());
    }

    #[test]
    fn test_rejects_unsafe_versions() {
        let temp = TempDir::new().unwrap();
        let cache = KernelCache::open(temp.path(), "kernel").unwrap();
        let fetcher = FakeFetcher::default();

        for version in ["", "../evil", "a/b", r"a\b"] {
            let err = cache.resolve(version, false, &fetcher).unwrap_err();
            assert!(matches!(err, Error::InvalidVersion { .. }), "{version:?}");
        }
        assert!(fetcher.calls.borrow().is_empty());
    }

    #[test]
    fn test_local_base_is_executable_dir() {
        let base = cache_base(CacheLocation::Local, PathStyle::host()).unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(Some(base.as_path()), exe.parent());
    }

    #[test]
    fn test_location_from_flag() {
        assert_eq!(CacheLocation::from_local_flag(true), CacheLocation::Local);
        assert_eq!(CacheLocation::from_local_flag(false), CacheLocation::User);
    }
}

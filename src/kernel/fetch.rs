//! Kernel download.
//!
//! A [`KernelFetcher`] is handed the cache paths for one version and must
//! leave the artifact at `artifact_path` on success. The resolver never
//! inspects what the fetcher wrote.

use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Environment variable holding the download URL template.
pub const URL_TEMPLATE_ENV: &str = "INITRD_KERNEL_URL";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no kernel download URL configured (set INITRD_KERNEL_URL or kernel.url_template)")]
    NoUrl,

    #[error("failed to download {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to download {url}: HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything a fetcher needs to place one kernel version in the cache.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub version: &'a str,
    pub artifact: &'a str,
    /// Whether the cache lives next to the program rather than in the user's home.
    pub local: bool,
    /// Temporary file to stream into.
    pub download_path: &'a Path,
    /// Final location; must exist when `fetch` returns `Ok`.
    pub artifact_path: &'a Path,
}

pub trait KernelFetcher {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<PathBuf, FetchError>;
}

/// Downloads kernels over HTTP(S).
///
/// The URL template may contain `{version}` and `{artifact}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    url_template: Option<String>,
}

impl HttpFetcher {
    pub fn new(url_template: Option<String>) -> Self {
        Self { url_template }
    }

    pub fn url_for(&self, request: &FetchRequest<'_>) -> Result<String, FetchError> {
        let template = self
            .url_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(FetchError::NoUrl)?;
        Ok(template
            .replace("{version}", request.version)
            .replace("{artifact}", request.artifact))
    }
}

impl KernelFetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<PathBuf, FetchError> {
        let url = self.url_for(request)?;
        info!("Downloading kernel {} from {}", request.version, url);

        let client = Client::builder()
            .user_agent(concat!("initrd-builder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
        let mut response = client
            .get(&url)
            .send()
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status(),
            });
        }

        let download_err = |source: io::Error| FetchError::Io {
            path: request.download_path.to_path_buf(),
            source,
        };
        let mut file = File::create(request.download_path).map_err(download_err)?;
        let bytes = response
            .copy_to(&mut file)
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;
        file.sync_all().map_err(download_err)?;
        drop(file);

        fs::rename(request.download_path, request.artifact_path).map_err(|source| {
            FetchError::Io {
                path: request.artifact_path.to_path_buf(),
                source,
            }
        })?;

        info!(
            "Kernel downloaded to {} ({} bytes)",
            request.artifact_path.display(),
            bytes
        );
        Ok(request.artifact_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(download: &'a Path, artifact: &'a Path) -> FetchRequest<'a> {
        FetchRequest {
            version: "9.9.9",
            artifact: "kernel",
            local: false,
            download_path: download,
            artifact_path: artifact,
        }
    }

    #[test]
    fn test_url_template_expansion() {
        let fetcher = HttpFetcher::new(Some(
            "https://example.org/releases/v{version}/{artifact}-{version}.bin".to_string(),
        ));
        let req = request(Path::new("/c/k.download"), Path::new("/c/k"));
        assert_eq!(
            fetcher.url_for(&req).unwrap(),
            "https://example.org/releases/v9.9.9/kernel-9.9.9.bin"
        );
    }

    #[test]
    fn test_missing_template() {
        let req = request(Path::new("/c/k.download"), Path::new("/c/k"));
        assert!(matches!(
            HttpFetcher::new(None).url_for(&req),
            Err(FetchError::NoUrl)
        ));
        assert!(matches!(
            HttpFetcher::new(Some("  ".to_string())).url_for(&req),
            Err(FetchError::NoUrl)
        ));
    }
}

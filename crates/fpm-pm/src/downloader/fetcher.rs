use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::archive::STAGING_PREFIX;
use crate::http::HttpClient;
use crate::{FpmError, Result};

/// Downloads a tarball and verifies its SHA-1 while streaming it to disk.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Fetch `url` into `dest_dir` and return the local path. A digest other
    /// than `expected_shasum` fails with [`FpmError::Integrity`] and leaves no
    /// file behind.
    async fn fetch(&self, url: &str, expected_shasum: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// Last path segment of a tarball URL, used to name its staging file.
pub fn archive_basename(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| "package.tgz".to_string())
}

/// Create an empty `.fpm-<random>-<basename>` file in `dest_dir` and keep it
/// for the download to fill.
pub fn create_staging_file(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;

    let staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(&format!("-{}", archive_basename(url)))
        .rand_bytes(8)
        .tempfile_in(dest_dir)?;
    staged
        .into_temp_path()
        .keep()
        .map_err(|e| FpmError::Io(e.error))
}

pub struct HttpFetcher {
    client: Arc<HttpClient>,
}

impl HttpFetcher {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, expected_shasum: &str, dest_dir: &Path) -> Result<PathBuf> {
        let dest = tokio::task::spawn_blocking({
            let url = url.to_string();
            let dest_dir = dest_dir.to_path_buf();
            move || create_staging_file(&url, &dest_dir)
        })
        .await
        .map_err(|e| FpmError::InstallationFailed(format!("staging task failed: {}", e)))??;

        let actual = match self.client.download_hashed(url, &dest).await {
            Ok(digest) => digest,
            Err(e) => {
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(e.into());
            }
        };

        if !actual.eq_ignore_ascii_case(expected_shasum.trim()) {
            if let Err(e) = tokio::fs::remove_file(&dest).await {
                log::warn!("Failed to remove {}: {}", dest.display(), e);
            }
            return Err(FpmError::Integrity {
                url: url.to_string(),
                expected: expected_shasum.to_string(),
                actual,
            });
        }

        log::debug!("Verified {} (sha1 {})", url, actual);
        Ok(dest)
    }
}

use async_trait::async_trait;
use std::sync::Arc;

use super::metadata::{select_version, RegistryMetadata, VersionManifest};
use crate::http::HttpClient;
use crate::Result;

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Prefer the abbreviated install document, fall back to the full packument
pub const INSTALL_METADATA_ACCEPT: &str =
    "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8, */*";

/// Turns a name and a range into a concrete version manifest.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn resolve(&self, name: &str, range: &str) -> Result<VersionManifest>;
}

/// Metadata URL of a package; scoped names keep the `@` and escape the slash.
pub fn package_url(registry: &str, name: &str) -> String {
    let base = registry.trim_end_matches('/');
    match name.strip_prefix('@') {
        Some(scoped) => format!("{}/@{}", base, urlencoding::encode(scoped)),
        None => format!("{}/{}", base, urlencoding::encode(name)),
    }
}

pub struct RegistryClient {
    http: Arc<HttpClient>,
    base_url: String,
}

impl RegistryClient {
    pub fn new(http: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch the metadata document of a package. Never cached.
    pub async fn metadata(&self, name: &str) -> Result<RegistryMetadata> {
        let url = package_url(&self.base_url, name);
        let metadata: RegistryMetadata = self
            .http
            .get_json_with_accept(&url, INSTALL_METADATA_ACCEPT)
            .await?;
        Ok(metadata)
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn resolve(&self, name: &str, range: &str) -> Result<VersionManifest> {
        let metadata = self.metadata(name).await?;
        let version = select_version(&metadata, name, range)?;
        log::debug!("Resolved {}@{} to {}", name, range, version);
        metadata.version_manifest(name, &version)
    }
}

//! In-memory registry and tarball helpers for unit tests.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tar::{EntryType, Header};

use crate::downloader::{create_staging_file, ArchiveFetcher};
use crate::registry::{package_url, select_version, Registry, RegistryMetadata, VersionManifest};
use crate::{FpmError, Result};

pub const FAKE_REGISTRY: &str = "https://registry.test";

pub fn sha1_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha1::digest(bytes))
}

enum TarEntry {
    Dir(String),
    File(String, Vec<u8>, u32),
    Symlink(String, String),
}

/// Builds gzipped tarballs entry by entry
#[derive(Default)]
pub struct TarballBuilder {
    entries: Vec<TarEntry>,
}

impl TarballBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push(TarEntry::Dir(path.to_string()));
        self
    }

    pub fn file(self, path: &str, content: &[u8]) -> Self {
        self.file_with_mode(path, content, 0o644)
    }

    pub fn file_with_mode(mut self, path: &str, content: &[u8], mode: u32) -> Self {
        self.entries
            .push(TarEntry::File(path.to_string(), content.to_vec(), mode));
        self
    }

    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.entries
            .push(TarEntry::Symlink(path.to_string(), target.to_string()));
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

        for entry in self.entries {
            let mut header = Header::new_gnu();
            match entry {
                TarEntry::Dir(path) => {
                    header.set_entry_type(EntryType::Directory);
                    header.set_mode(0o755);
                    header.set_size(0);
                    builder.append_data(&mut header, path, std::io::empty()).unwrap();
                }
                TarEntry::File(path, content, mode) => {
                    header.set_entry_type(EntryType::Regular);
                    header.set_mode(mode);
                    header.set_size(content.len() as u64);
                    builder.append_data(&mut header, path, content.as_slice()).unwrap();
                }
                TarEntry::Symlink(path, target) => {
                    header.set_entry_type(EntryType::Symlink);
                    header.set_mode(0o777);
                    header.set_size(0);
                    builder.append_link(&mut header, path, target).unwrap();
                }
            }
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    pub fn write_to(self, path: &Path) {
        std::fs::write(path, self.into_bytes()).unwrap();
    }
}

/// Tarball of a published package: `package/package.json` plus an index file.
pub fn package_tarball(name: &str, version: &str, deps: &[(&str, &str)]) -> Vec<u8> {
    let dependencies: serde_json::Map<String, serde_json::Value> = deps
        .iter()
        .map(|(n, r)| (n.to_string(), json!(r)))
        .collect();
    let manifest = json!({ "name": name, "version": version, "dependencies": dependencies });

    TarballBuilder::new()
        .dir("package")
        .file("package/package.json", manifest.to_string().as_bytes())
        .file("package/index.js", format!("// {}@{}\n", name, version).as_bytes())
        .into_bytes()
}

/// Registry and tarball host in one, counting every call.
#[derive(Default)]
pub struct FakeRegistry {
    metadata: Mutex<HashMap<String, RegistryMetadata>>,
    tarballs: Mutex<HashMap<String, Vec<u8>>>,
    resolves: Mutex<HashMap<String, usize>>,
    fetches: Mutex<HashMap<String, usize>>,
    fetch_delay: Mutex<Option<Duration>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tarball_url(name: &str, version: &str) -> String {
        let basename = name.rsplit('/').next().unwrap_or(name);
        format!("{}/-/{}-{}.tgz", package_url(FAKE_REGISTRY, name), basename, version)
    }

    /// Publish a version and move the `latest` tag to it.
    pub fn publish(&self, name: &str, version: &str, deps: &[(&str, &str)]) {
        let bytes = package_tarball(name, version, deps);
        let shasum = sha1_hex(&bytes);
        self.publish_raw(name, version, deps, bytes, &shasum);
    }

    pub fn publish_raw(
        &self,
        name: &str,
        version: &str,
        deps: &[(&str, &str)],
        tarball: Vec<u8>,
        shasum: &str,
    ) {
        let url = Self::tarball_url(name, version);
        let dependencies: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|(n, r)| (n.to_string(), json!(r)))
            .collect();

        let mut metadata = self.metadata.lock().unwrap();
        let entry = metadata.entry(name.to_string()).or_default();
        entry.name = Some(name.to_string());
        entry.dist_tags.insert("latest".to_string(), version.to_string());
        entry.versions.insert(
            version.to_string(),
            json!({
                "name": name,
                "version": version,
                "dependencies": dependencies,
                "dist": { "tarball": url, "shasum": shasum }
            }),
        );

        self.tarballs.lock().unwrap().insert(url, tarball);
    }

    pub fn tag(&self, name: &str, tag: &str, version: &str) {
        let mut metadata = self.metadata.lock().unwrap();
        if let Some(entry) = metadata.get_mut(name) {
            entry.dist_tags.insert(tag.to_string(), version.to_string());
        }
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn resolve_count(&self, name: &str) -> usize {
        self.resolves.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    /// Tarball fetches of any version of `name`
    pub fn fetch_count(&self, name: &str) -> usize {
        let prefix = format!("{}/-/", package_url(FAKE_REGISTRY, name));
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.starts_with(&prefix))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn resolve(&self, name: &str, range: &str) -> Result<VersionManifest> {
        *self.resolves.lock().unwrap().entry(name.to_string()).or_default() += 1;

        let metadata = self
            .metadata
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| FpmError::Upstream {
                url: package_url(FAKE_REGISTRY, name),
                status: 404,
            })?;

        let version = select_version(&metadata, name, range)?;
        metadata.version_manifest(name, &version)
    }
}

#[async_trait]
impl ArchiveFetcher for FakeRegistry {
    async fn fetch(&self, url: &str, expected_shasum: &str, dest_dir: &Path) -> Result<PathBuf> {
        *self.fetches.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let bytes = self
            .tarballs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FpmError::Upstream {
                url: url.to_string(),
                status: 404,
            })?;

        let actual = sha1_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected_shasum) {
            return Err(FpmError::Integrity {
                url: url.to_string(),
                expected: expected_shasum.to_string(),
                actual,
            });
        }

        let dest = create_staging_file(url, dest_dir)?;
        std::fs::write(&dest, bytes)?;
        Ok(dest)
    }
}

//! Registry metadata documents.

use fpm_semver::{parse_version, Range, Version};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{FpmError, Result};

/// Packument as served by `GET <registry>/<name>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryMetadata {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,

    /// Version entries are kept raw and only decoded once chosen
    #[serde(default)]
    pub versions: IndexMap<String, serde_json::Value>,
}

/// The parts of one published version needed to fetch and recurse into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    pub dist: Dist,

    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dist {
    pub tarball: String,

    pub shasum: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

impl RegistryMetadata {
    /// Decode the manifest of a published version.
    pub fn version_manifest(&self, name: &str, version: &str) -> Result<VersionManifest> {
        let raw = self.versions.get(version).ok_or_else(|| FpmError::NoMatchingVersion {
            name: name.to_string(),
            range: version.to_string(),
        })?;

        let mut manifest: VersionManifest = serde_json::from_value(raw.clone())?;
        if manifest.name.is_empty() {
            manifest.name = name.to_string();
        }
        if manifest.version.is_empty() {
            manifest.version = version.to_string();
        }
        Ok(manifest)
    }

    /// Published versions that parse as semantic versions, highest first.
    pub fn sorted_versions(&self) -> Vec<(Version, &str)> {
        let mut parsed: Vec<(Version, &str)> = self
            .versions
            .keys()
            .filter_map(|raw| match parse_version(raw) {
                Ok(version) => Some((version, raw.as_str())),
                Err(_) => {
                    log::trace!("Skipping unparseable version {}", raw);
                    None
                }
            })
            .collect();

        parsed.sort_by(|a, b| b.0.cmp(&a.0));
        parsed
    }
}

/// Pick the version a request resolves to.
///
/// A dist-tag name (`latest`, `next`, ...) selects the tagged version even when
/// higher versions exist; anything else is a range and selects the highest
/// satisfying published version.
pub fn select_version(metadata: &RegistryMetadata, name: &str, range: &str) -> Result<String> {
    let range = range.trim();

    if let Some(tagged) = metadata.dist_tags.get(range) {
        log::trace!("{}@{} is tagged {}", name, range, tagged);
        return Ok(tagged.clone());
    }
    if range == "latest" {
        return Err(FpmError::NoMatchingVersion {
            name: name.to_string(),
            range: range.to_string(),
        });
    }

    let constraint = Range::parse(range).map_err(|e| FpmError::InvalidRange {
        name: name.to_string(),
        range: range.to_string(),
        reason: e.to_string(),
    })?;

    metadata
        .sorted_versions()
        .into_iter()
        .find(|(version, _)| constraint.satisfies(version))
        .map(|(_, raw)| raw.to_string())
        .ok_or_else(|| FpmError::NoMatchingVersion {
            name: name.to_string(),
            range: range.to_string(),
        })
}

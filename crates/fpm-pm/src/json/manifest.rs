use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::package::PackageRequest;
use crate::{FpmError, Result};

const MANIFEST_FILE: &str = "package.json";

/// Lenient view of an installed package's package.json
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<PackageRequest>,
}

impl PackageManifest {
    /// Read a manifest, ignoring fields that are not shaped as expected.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        let dependencies = value
            .get("dependencies")
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, range)| {
                        range.as_str().map(|range| PackageRequest::new(name.clone(), range))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: text("name"),
            version: text("version"),
            dependencies,
        }
    }
}

/// Manifest files found inside an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    pub primary: PathBuf,
    /// Nested manifests of workspace-style sub-packages
    pub additional: Vec<PathBuf>,
}

fn is_nested_node_modules(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == "node_modules"
}

fn manifests_below(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_nested_node_modules(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == MANIFEST_FILE)
}

/// Find the manifests of the package installed at `package_dir`.
///
/// The primary manifest is `package_dir/package.json`, falling back to the
/// shallowest one below it. Every other package.json under the primary's
/// directory (outside nested `node_modules`) is reported as additional.
pub fn locate_manifests(package_dir: &Path, name: &str) -> Result<ManifestLocation> {
    let direct = package_dir.join(MANIFEST_FILE);
    let primary = if direct.is_file() {
        direct
    } else {
        manifests_below(package_dir)
            .min_by_key(|e| e.depth())
            .map(|e| e.into_path())
            .ok_or_else(|| FpmError::MissingDependencyManifest {
                name: name.to_string(),
            })?
    };

    let root = primary.parent().unwrap_or(package_dir);
    let additional = manifests_below(root)
        .map(|e| e.into_path())
        .filter(|p| p != &primary)
        .collect();

    Ok(ManifestLocation { primary, additional })
}

/// Dependencies declared by the package at `package_dir`, across its primary
/// and additional manifests; the first declaration of a name wins.
pub fn declared_dependencies(package_dir: &Path, name: &str) -> Result<Vec<PackageRequest>> {
    let location = locate_manifests(package_dir, name)?;
    let mut requests = PackageManifest::load(&location.primary)?.dependencies;

    for path in &location.additional {
        match PackageManifest::load(path) {
            Ok(manifest) => requests.extend(manifest.dependencies),
            Err(e) => log::warn!("Ignoring {} of {}: {}", path.display(), name, e),
        }
    }

    let mut seen = HashSet::new();
    requests.retain(|r| r.name != name && seen.insert(r.name.clone()));
    Ok(requests)
}

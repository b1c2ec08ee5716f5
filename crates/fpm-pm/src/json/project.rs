use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::package::PackageRequest;
use crate::{FpmError, Result};

/// Which dependency section of package.json a request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencySection {
    Dependencies,
    DevDependencies,
}

impl DependencySection {
    pub fn key(&self) -> &'static str {
        match self {
            DependencySection::Dependencies => "dependencies",
            DependencySection::DevDependencies => "devDependencies",
        }
    }

    pub fn for_dev(dev: bool) -> Self {
        if dev {
            DependencySection::DevDependencies
        } else {
            DependencySection::Dependencies
        }
    }
}

/// The project's own package.json, kept as an order-preserving document so
/// unrelated fields survive a rewrite untouched.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    path: PathBuf,
    document: Map<String, Value>,
}

impl ProjectManifest {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(FpmError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }

        log::debug!("Reading {}", path.display());
        let content = fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(document) => Ok(Self {
                path: path.to_path_buf(),
                document,
            }),
            _ => Err(FpmError::InvalidManifest {
                path: path.to_path_buf(),
                message: "top level must be an object".to_string(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Requests declared in one section, in file order
    pub fn requests(&self, section: DependencySection) -> Result<Vec<PackageRequest>> {
        let Some(value) = self.document.get(section.key()) else {
            return Ok(Vec::new());
        };
        let entries = value.as_object().ok_or_else(|| self.invalid(format!(
            "\"{}\" must be an object",
            section.key()
        )))?;

        entries
            .iter()
            .map(|(name, range)| match range.as_str() {
                Some(range) => Ok(PackageRequest::new(name.clone(), range)),
                None => Err(self.invalid(format!(
                    "version for dependency {} is not a string",
                    name
                ))),
            })
            .collect()
    }

    /// Requests of `dependencies` followed by `devDependencies`
    pub fn all_requests(&self) -> Result<Vec<PackageRequest>> {
        let mut requests = self.requests(DependencySection::Dependencies)?;
        requests.extend(self.requests(DependencySection::DevDependencies)?);
        Ok(requests)
    }

    /// Insert or overwrite one dependency and sort the section's keys.
    pub fn set_dependency(&mut self, section: DependencySection, name: &str, version: &str) -> Result<()> {
        let mut entries: Vec<(String, Value)> = match self.document.remove(section.key()) {
            None => Vec::new(),
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(other) => {
                self.document.insert(section.key().to_string(), other);
                return Err(self.invalid(format!("\"{}\" must be an object", section.key())));
            }
        };

        entries.retain(|(key, _)| key != name);
        entries.push((name.to_string(), Value::String(version.to_string())));
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        self.document
            .insert(section.key().to_string(), Value::Object(entries.into_iter().collect()));
        Ok(())
    }

    /// Serialize with 4-space indentation and a trailing newline
    pub fn to_json_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.document.serialize(&mut serializer)?;
        buffer.push(b'\n');

        String::from_utf8(buffer).map_err(|e| self.invalid(e.to_string()))
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.to_json_string()?)?;
        log::debug!("Wrote {}", self.path.display());
        Ok(())
    }

    fn invalid(&self, message: String) -> FpmError {
        FpmError::InvalidManifest {
            path: self.path.clone(),
            message,
        }
    }
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::json::{declared_dependencies, PackageManifest};
use crate::package::validate_package_name;
use crate::FpmError;

/// Read-only view of the install root
#[derive(Debug, Clone)]
pub struct InstallTree {
    root: PathBuf,
}

impl InstallTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a package; scoped names nest under their scope.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether `name` and everything its manifests declare, transitively,
    /// are already extracted. Declaration cycles are walked once.
    pub fn is_fully_present(&self, name: &str) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![name.to_string()];

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Err(e) = validate_package_name(&current) {
                log::debug!("Treating {} as incomplete: {}", current, e);
                return false;
            }

            let dir = self.package_dir(&current);
            if !dir.is_dir() {
                log::trace!("{} is missing from {}", current, self.root.display());
                return false;
            }

            match declared_dependencies(&dir, &current) {
                Ok(deps) => pending.extend(
                    deps.into_iter()
                        .map(|d| d.name)
                        .filter(|n| !visited.contains(n)),
                ),
                Err(FpmError::MissingDependencyManifest { .. }) => {}
                Err(e) => {
                    log::debug!("Treating {} as incomplete: {}", current, e);
                    return false;
                }
            }
        }

        true
    }

    /// Version recorded in an installed package's own package.json
    pub fn installed_version(&self, name: &str) -> Option<String> {
        PackageManifest::load(&self.package_dir(name).join("package.json"))
            .ok()
            .and_then(|m| m.version)
    }
}

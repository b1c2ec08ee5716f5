//! package.json handling for the project and for installed packages.

mod manifest;
mod project;

pub use manifest::{declared_dependencies, locate_manifests, ManifestLocation, PackageManifest};
pub use project::{DependencySection, ProjectManifest};

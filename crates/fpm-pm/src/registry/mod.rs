//! Registry access and version selection.

mod client;
mod metadata;

pub use client::{package_url, Registry, RegistryClient, DEFAULT_REGISTRY, INSTALL_METADATA_ACCEPT};
pub use metadata::{select_version, Dist, RegistryMetadata, VersionManifest};

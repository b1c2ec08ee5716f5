//! Package installation engine behind the `fpm` command.
//!
//! Resolves npm registry versions, downloads and verifies tarballs, extracts
//! them into `node_modules` and follows declared dependencies concurrently.

pub mod cli;
pub mod config;
pub mod dependency_graph;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod json;
pub mod package;
pub mod project;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use dependency_graph::{DependencyGraph, GraphError};
pub use error::{FpmError, Result};
pub use installer::{FailurePolicy, InstallReport, InstallRun, Installer};
pub use package::{InstallRecord, PackageRequest};
pub use project::{Project, ProjectBuilder};
pub use registry::{Registry, RegistryClient};

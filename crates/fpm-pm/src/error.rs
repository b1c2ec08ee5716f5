use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FpmError {
    // Resolution errors
    #[error("Invalid package name \"{name}\": {reason}")]
    InvalidPackageName { name: String, reason: String },

    #[error("Invalid version range \"{range}\" for {name}: {reason}")]
    InvalidRange {
        name: String,
        range: String,
        reason: String,
    },

    #[error("No matching version found for {name}@{range}")]
    NoMatchingVersion { name: String, range: String },

    // Transfer errors
    #[error("Registry responded with HTTP {status} for {url}")]
    Upstream { url: String, status: u16 },

    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    // Extraction errors
    #[error("Unsupported archive entry {path} ({kind})")]
    UnsupportedEntry { path: String, kind: String },

    #[error("Path traversal detected in archive: {0}")]
    PathTraversal(String),

    // Manifest errors
    #[error("package.json not found at {}", path.display())]
    ManifestNotFound { path: PathBuf },

    #[error("No package.json found for installed package {name}")]
    MissingDependencyManifest { name: String },

    #[error("Invalid manifest {}: {message}", path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Installation errors
    #[error("Installation failed: {0}")]
    InstallationFailed(String),

    #[error("Installation cancelled")]
    Cancelled,

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FpmError>;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FpmError, Result};

/// Project-level configuration file
pub const PROJECT_CONFIG_FILE: &str = ".fpmrc.json";

/// Represents the source of a configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Default built-in value
    Default,
    /// From the global config file
    Global,
    /// From the project's .fpmrc.json
    Project,
    /// From environment variable
    Environment(String),
    /// From a command-line flag
    Command,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Global => "global",
            ConfigSource::Project => "project",
            ConfigSource::Environment(var) => var,
            ConfigSource::Command => "command",
        }
    }
}

/// Raw configuration data as stored in config files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HashMap<String, serde_json::Value>>,
}

/// Loads configuration from various sources
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get an FPM_* environment variable
    pub fn get_fpm_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Get the fpm home directory holding the global config
    pub fn get_fpm_home(&self) -> PathBuf {
        if let Some(home) = self.get_fpm_env("FPM_HOME") {
            return PathBuf::from(home);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "fpm") {
            proj_dirs.config_dir().to_path_buf()
        } else if let Some(base_dirs) = directories::BaseDirs::new() {
            base_dirs.home_dir().join(".fpm")
        } else {
            PathBuf::from(".fpm")
        }
    }

    /// Load configuration from a JSON file; a missing file is an empty config
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| FpmError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| FpmError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn load_global_config(&self) -> Result<RawConfig> {
        self.load_config_file(self.get_fpm_home().join("config.json"))
    }

    pub fn load_project_config<P: AsRef<Path>>(&self, project_dir: P) -> Result<RawConfig> {
        self.load_config_file(project_dir.as_ref().join(PROJECT_CONFIG_FILE))
    }

    /// Environment variable name for a key: "install-dir" -> "FPM_INSTALL_DIR"
    pub fn env_var_name(key: &str) -> String {
        format!("FPM_{}", key.replace('-', "_").to_uppercase())
    }

    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_fpm_env(&Self::env_var_name(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_as_str() {
        assert_eq!(ConfigSource::Default.as_str(), "default");
        assert_eq!(ConfigSource::Global.as_str(), "global");
        assert_eq!(ConfigSource::Project.as_str(), "project");
        assert_eq!(ConfigSource::Command.as_str(), "command");
        assert_eq!(ConfigSource::Environment("FPM_REGISTRY".to_string()).as_str(), "FPM_REGISTRY");
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(ConfigLoader::env_var_name("install-dir"), "FPM_INSTALL_DIR");
        assert_eq!(ConfigLoader::env_var_name("registry"), "FPM_REGISTRY");
    }

    #[test]
    fn test_env_disabled() {
        let loader = ConfigLoader::new(false);
        assert_eq!(loader.get_fpm_env("PATH"), None);
        assert_eq!(loader.get_env_config("registry"), None);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let loader = ConfigLoader::new(false);
        let raw = loader.load_config_file("/definitely/not/here.json").unwrap();
        assert!(raw.config.is_none());
    }
}

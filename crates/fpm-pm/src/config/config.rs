use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::error::{FpmError, Result};
use crate::http::{HttpClientConfig, DEFAULT_USER_AGENT};
use crate::registry::DEFAULT_REGISTRY;

const KEYS: [&str; 7] = [
    "registry",
    "install-dir",
    "manifest-file",
    "save-prefix",
    "max-concurrency",
    "network-timeout",
    "user-agent",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Registry base URL
    #[serde(default = "default_registry")]
    pub registry: String,

    /// Install root, relative to the project directory
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Project manifest, relative to the project directory
    #[serde(default = "default_manifest_file")]
    pub manifest_file: PathBuf,

    /// Prefix written in front of versions recorded by `add`
    #[serde(default = "default_save_prefix")]
    pub save_prefix: String,

    /// Direct dependencies installed at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Seconds; 0 disables the timeout
    #[serde(default)]
    pub network_timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(skip)]
    base_dir: Option<PathBuf>,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("node_modules")
}

fn default_manifest_file() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_save_prefix() -> String {
    "^".to_string()
}

fn default_max_concurrency() -> usize {
    16
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            install_dir: default_install_dir(),
            manifest_file: default_manifest_file(),
            save_prefix: default_save_prefix(),
            max_concurrency: default_max_concurrency(),
            network_timeout: 0,
            user_agent: default_user_agent(),
            base_dir: None,
            sources: HashMap::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Config with defaults and base directory
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        let mut config = Self::default();
        config.base_dir = Some(base_dir.as_ref().to_path_buf());
        config
    }

    /// Build configuration from all sources (defaults, global, project, env)
    pub fn build<P: AsRef<Path>>(project_dir: Option<P>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        if let Some(ref dir) = project_dir {
            config.base_dir = Some(dir.as_ref().to_path_buf());
        }

        for key in KEYS {
            config.sources.insert(key.to_string(), ConfigSource::Default);
        }

        let global_config = loader.load_global_config()?;
        config.merge_raw_config(global_config, ConfigSource::Global)?;

        if let Some(project_dir) = &project_dir {
            let project_config = loader.load_project_config(project_dir)?;
            config.merge_raw_config(project_config, ConfigSource::Project)?;
        }

        if use_environment {
            config.apply_env_overrides(&loader)?;
        }

        log::debug!(
            "Config: registry={} ({}), install-dir={:?}, max-concurrency={}",
            config.registry,
            config.get_source("registry").map_or("unknown", |s| s.as_str()),
            config.install_dir,
            config.max_concurrency
        );

        Ok(config)
    }

    pub fn set_base_dir<P: AsRef<Path>>(&mut self, base_dir: P) {
        self.base_dir = Some(base_dir.as_ref().to_path_buf());
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Get the source of a configuration value
    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Override a value from the command line
    pub fn set_command_value(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        self.merge_config_value(key, value, ConfigSource::Command)
    }

    /// Install root (resolved as absolute path when a base dir is known)
    pub fn get_install_dir(&self) -> PathBuf {
        self.resolve_path(&self.install_dir)
    }

    /// Project manifest path (resolved against the base dir)
    pub fn get_manifest_path(&self) -> PathBuf {
        self.resolve_path(&self.manifest_file)
    }

    pub fn get_network_timeout(&self) -> Option<Duration> {
        (self.network_timeout > 0).then(|| Duration::from_secs(self.network_timeout))
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        let config = HttpClientConfig::new().with_user_agent(self.user_agent.clone());
        match self.get_network_timeout() {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(ref base) = self.base_dir {
            base.join(path)
        } else {
            path.to_path_buf()
        }
    }

    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<()> {
        if let Some(config_map) = raw.config {
            for (key, value) in config_map {
                self.merge_config_value(&key, value, source.clone())?;
            }
        }
        Ok(())
    }

    fn merge_config_value(
        &mut self,
        key: &str,
        value: serde_json::Value,
        source: ConfigSource,
    ) -> Result<()> {
        match key {
            "registry" => {
                if let Some(s) = value.as_str() {
                    self.registry = validate_registry(s)?;
                    self.sources.insert(key.to_string(), source);
                }
            }
            "install-dir" => {
                if let Some(s) = value.as_str() {
                    self.install_dir = PathBuf::from(s);
                    self.sources.insert(key.to_string(), source);
                }
            }
            "manifest-file" => {
                if let Some(s) = value.as_str() {
                    self.manifest_file = PathBuf::from(s);
                    self.sources.insert(key.to_string(), source);
                }
            }
            "save-prefix" => {
                if let Some(s) = value.as_str() {
                    self.save_prefix = s.to_string();
                    self.sources.insert(key.to_string(), source);
                }
            }
            "max-concurrency" => {
                if let Some(n) = value.as_u64() {
                    self.max_concurrency = (n as usize).max(1);
                    self.sources.insert(key.to_string(), source);
                }
            }
            "network-timeout" => {
                if let Some(n) = value.as_u64() {
                    self.network_timeout = n;
                    self.sources.insert(key.to_string(), source);
                }
            }
            "user-agent" => {
                if let Some(s) = value.as_str() {
                    self.user_agent = s.to_string();
                    self.sources.insert(key.to_string(), source);
                }
            }
            _ => {
                log::debug!("Ignoring unknown config key {} from {}", key, source.as_str());
            }
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<()> {
        for key in KEYS {
            let Some(raw) = loader.get_env_config(key) else {
                continue;
            };

            let value = match key {
                "max-concurrency" | "network-timeout" => match raw.parse::<u64>() {
                    Ok(n) => serde_json::Value::from(n),
                    Err(_) => {
                        log::warn!("Ignoring {}={}: not a number", ConfigLoader::env_var_name(key), raw);
                        continue;
                    }
                },
                _ => serde_json::Value::String(raw),
            };

            self.merge_config_value(key, value, ConfigSource::Environment(ConfigLoader::env_var_name(key)))?;
        }
        Ok(())
    }
}

fn validate_registry(registry: &str) -> Result<String> {
    let parsed = url::Url::parse(registry)
        .map_err(|e| FpmError::Config(format!("Invalid registry URL {}: {}", registry, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(registry.trim_end_matches('/').to_string()),
        scheme => Err(FpmError::Config(format!(
            "Invalid registry URL {}: unsupported scheme {}",
            registry, scheme
        ))),
    }
}

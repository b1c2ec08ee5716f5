//! Configuration management for fpm
//!
//! Configuration is merged from several sources, highest priority first:
//!
//! 1. Command-line overrides (`--registry`)
//! 2. Environment variables (`FPM_*`, e.g. `FPM_REGISTRY`, `FPM_INSTALL_DIR`)
//! 3. Project `.fpmrc.json` config section
//! 4. Global `<config dir>/fpm/config.json` (or `$FPM_HOME/config.json`)
//! 5. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use fpm_pm::config::Config;
//! use std::path::Path;
//!
//! let config = Config::build(Some(Path::new("/path/to/project")), true).unwrap();
//! println!("Installing into {:?}", config.get_install_dir());
//! println!("Registry: {}", config.registry);
//! ```

mod config;
mod source;

pub use config::Config;
pub use source::{ConfigLoader, ConfigSource, RawConfig, PROJECT_CONFIG_FILE};

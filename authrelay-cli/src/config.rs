//! CLI configuration handling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use authrelay_core::RelayConfig;
use directories::ProjectDirs;

/// Configuration as loaded, with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub relay: RelayConfig,

    /// Path to the configuration file that was read, if it existed.
    pub source: Option<PathBuf>,
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file yields the defaults; an unreadable or malformed one is an
/// error.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path(),
    };

    if !config_path.exists() {
        if path.is_some() {
            anyhow::bail!("config file {:?} does not exist", config_path);
        }
        return Ok(LoadedConfig {
            relay: RelayConfig::default(),
            source: None,
        });
    }

    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {:?}", config_path))?;
    let relay: RelayConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", config_path))?;

    Ok(LoadedConfig {
        relay,
        source: Some(config_path),
    })
}

/// `config.toml` in the platform config directory.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("authrelay.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "raibid-labs", "authrelay")
}

//! Configuration loading from `~/.multiway/config.toml` with defaults.

use multiway_types::config::{multiway_home, RelayConfig};
use multiway_types::error::RelayError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load relay configuration from a TOML file, with defaults.
///
/// A missing, unreadable or unparsable file yields the default configuration.
pub fn load_config(path: Option<&Path>) -> RelayConfig {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        return RelayConfig::default();
    }

    let contents = match std::fs::read_to_string(&config_path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(
                error = %e,
                path = %config_path.display(),
                "Failed to read config file, using defaults"
            );
            return RelayConfig::default();
        }
    };

    match toml::from_str::<RelayConfig>(&contents) {
        Ok(mut config) => {
            if config.command_prefix.trim().is_empty() {
                warn!(path = %config_path.display(), "Empty command_prefix, using the default");
                config.command_prefix = RelayConfig::default().command_prefix;
            }
            info!(path = %config_path.display(), "Loaded configuration");
            config
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %config_path.display(),
                "Failed to parse config, using defaults"
            );
            RelayConfig::default()
        }
    }
}

/// Write `config` to `path` unless a file is already there.
///
/// Returns `true` if a new file was written.
pub fn write_default_config(path: &Path, config: &RelayConfig) -> Result<bool, RelayError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config).map_err(|e| RelayError::Config(e.to_string()))?;
    std::fs::write(path, body)?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(true)
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    multiway_home().join("config.toml")
}

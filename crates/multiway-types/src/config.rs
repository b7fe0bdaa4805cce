//! Relay configuration, loaded from `~/.multiway/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Directory holding the document database.
    pub data_dir: PathBuf,
    /// Prefix that marks a chat message as a relay command.
    pub command_prefix: String,
    /// User IDs allowed to run relay commands.
    pub owners: Vec<String>,
    /// Announcer integration.
    pub announcer: AnnouncerConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: multiway_home().join("data"),
            command_prefix: "!relay".to_string(),
            owners: Vec::new(),
            announcer: AnnouncerConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Path of the SQLite document database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("multiway.db")
    }

    /// Whether a user may run relay commands.
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owners.iter().any(|o| o == user_id)
    }
}

/// Where to read the announcer's subscription settings from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    /// JSON settings file written by the announcer integration.
    pub settings_path: Option<PathBuf>,
}

/// The Multiway home directory: `$MULTIWAY_HOME`, else `~/.multiway`.
pub fn multiway_home() -> PathBuf {
    if let Some(home) = std::env::var_os("MULTIWAY_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".multiway")
}

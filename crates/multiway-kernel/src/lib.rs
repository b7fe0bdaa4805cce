//! Boot sequence for the Multiway relay.
//!
//! Opens the document database, loads the routing tables and hands them to a
//! [`RelayBridge`] running against a host platform.

pub mod config;
pub mod error;

use crate::error::{KernelError, KernelResult};
use multiway_channels::announcer::{AnnouncerSettingsFile, AnnouncerSource};
use multiway_channels::bridge::{RelayBridge, RelayEngine};
use multiway_channels::store::ConfigStore;
use multiway_channels::types::RelayPlatform;
use multiway_memory::SqliteDocumentStore;
use multiway_types::config::RelayConfig;
use std::sync::Arc;
use tracing::info;

/// A booted relay: configuration plus loaded routing tables.
pub struct RelayKernel {
    config: RelayConfig,
    store: ConfigStore,
    announcer: Option<Arc<dyn AnnouncerSource>>,
}

impl RelayKernel {
    /// Open the database under `config.data_dir` and load the tables.
    pub fn boot(config: RelayConfig) -> KernelResult<Self> {
        let db_path = config.database_path();
        let backend = SqliteDocumentStore::open(&db_path)
            .map_err(|e| KernelError::BootFailed(format!("{}: {e}", db_path.display())))?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Boot against an already-open document store.
    pub fn with_backend(config: RelayConfig, backend: Arc<SqliteDocumentStore>) -> Self {
        let store = ConfigStore::load(backend);
        let announcer = config.announcer.settings_path.as_ref().map(|path| {
            info!(path = %path.display(), "Announcer settings enabled");
            Arc::new(AnnouncerSettingsFile::new(path)) as Arc<dyn AnnouncerSource>
        });
        Self {
            config,
            store,
            announcer,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Direct access for offline edits (CLI).
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    /// Build the engine for `platform`, consuming the kernel.
    pub fn into_engine(self, platform: Arc<dyn RelayPlatform>) -> RelayEngine {
        let engine = RelayEngine::new(platform, self.store, &self.config);
        match self.announcer {
            Some(announcer) => engine.with_announcer(announcer),
            None => engine,
        }
    }

    /// Start relaying messages on `platform`.
    pub async fn start_bridge(self, platform: Arc<dyn RelayPlatform>) -> KernelResult<RelayBridge> {
        let name = platform.name().to_string();
        RelayBridge::start(self.into_engine(platform))
            .await
            .map_err(|e| KernelError::BootFailed(format!("platform {name}: {e}")))
    }
}

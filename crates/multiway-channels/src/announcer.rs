//! Read-only access to the announcer integration's subscriptions.

use multiway_types::channel::ChannelId;
use multiway_types::error::{RelayError, RelayResult};
use multiway_types::relay::unique_in_order;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Source of channels subscribed to the announcer feed.
pub trait AnnouncerSource: Send + Sync {
    /// Subscribed channels, deduplicated, in settings order.
    fn subscribed_channels(&self) -> RelayResult<Vec<ChannelId>>;
}

/// One server's announcer subscription. Other keys are ignored.
#[derive(Debug, Deserialize)]
struct Subscription {
    channel: ChannelId,
}

/// Announcer settings stored as a JSON file: `{server_id: {"channel": id, ...}}`.
pub struct AnnouncerSettingsFile {
    path: PathBuf,
}

impl AnnouncerSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AnnouncerSource for AnnouncerSettingsFile {
    fn subscribed_channels(&self) -> RelayResult<Vec<ChannelId>> {
        let unavailable = |e: &dyn std::fmt::Display| {
            RelayError::AnnouncerUnavailable(format!("{}: {e}", self.path.display()))
        };
        let raw = std::fs::read_to_string(&self.path).map_err(|e| unavailable(&e))?;
        let settings: BTreeMap<String, Subscription> =
            serde_json::from_str(&raw).map_err(|e| unavailable(&e))?;
        Ok(unique_in_order(settings.into_values().map(|s| s.channel)))
    }
}

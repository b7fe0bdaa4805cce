//! Snapshot of the text channels the platform can currently reach.

use crate::types::RelayPlatform;
use multiway_types::channel::{ChannelId, ChannelInfo};
use multiway_types::error::{RelayError, RelayResult};
use std::collections::HashMap;

/// Reachable text channels keyed by ID.
///
/// Always built whole from a fresh enumeration; never patched in place, so a
/// channel that disappeared from the platform cannot linger.
#[derive(Debug, Clone, Default)]
pub struct LiveChannelIndex {
    channels: HashMap<ChannelId, ChannelInfo>,
}

impl LiveChannelIndex {
    /// Build from a channel list, keeping only text channels.
    pub fn from_channels(channels: impl IntoIterator<Item = ChannelInfo>) -> Self {
        Self {
            channels: channels
                .into_iter()
                .filter(ChannelInfo::is_text)
                .map(|c| (c.id.clone(), c))
                .collect(),
        }
    }

    /// Enumerate the platform's channels and build a fresh index.
    pub async fn fetch(platform: &dyn RelayPlatform) -> RelayResult<Self> {
        let channels = platform
            .channels()
            .await
            .map_err(|e| RelayError::Platform(e.to_string()))?;
        Ok(Self::from_channels(channels))
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.channels.contains_key(id)
    }

    pub fn get(&self, id: &ChannelId) -> Option<&ChannelInfo> {
        self.channels.get(id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Keep only the IDs present in the index, preserving order.
    pub fn retain_live<'a, I>(&self, ids: I) -> Vec<ChannelId>
    where
        I: IntoIterator<Item = &'a ChannelId>,
    {
        ids.into_iter()
            .filter(|id| self.contains(id))
            .cloned()
            .collect()
    }
}

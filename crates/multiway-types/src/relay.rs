//! Persisted routing tables: relays, broadcasts and RSS links.
//!
//! The serialized shapes match the documents written by earlier deployments,
//! so existing data directories keep loading.

use crate::channel::ChannelId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Document key for the relay table.
pub const RELAYS_DOCUMENT: &str = "relays";
/// Document key for the broadcast table.
pub const BROADCASTS_DOCUMENT: &str = "broadcasts";
/// Document key for the RSS link table.
pub const RSS_DOCUMENT: &str = "rss";

/// Minimum number of live channels needed to form a relay.
pub const MIN_RELAY_CHANNELS: usize = 2;

/// One named relay: the configured member channels in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEntry {
    #[serde(rename = "chans", default)]
    pub channels: Vec<ChannelId>,
}

impl RelayEntry {
    pub fn new(channels: Vec<ChannelId>) -> Self {
        Self { channels }
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.channels.contains(id)
    }
}

/// Relay name (lower-cased) -> entry.
pub type RelayTable = BTreeMap<String, RelayEntry>;

/// Broadcast source -> destination set.
pub type BroadcastTable = BTreeMap<ChannelId, BTreeSet<ChannelId>>;

/// RSS listener table plus the opaque per-feed options blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RssSettings {
    /// Listener channel -> broadcast key.
    #[serde(default)]
    pub links: BTreeMap<ChannelId, ChannelId>,
    /// Carried through untouched.
    #[serde(default)]
    pub opts: serde_json::Map<String, serde_json::Value>,
}

impl RssSettings {
    /// Broadcast key a listener channel is redirected to.
    pub fn broadcast_key(&self, listener: &ChannelId) -> Option<&ChannelId> {
        self.links.get(listener)
    }
}

/// Normalize a relay name for lookup: relay names are case-insensitive.
pub fn normalize_relay_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Deduplicate, keeping the first occurrence of each element in order.
pub fn unique_in_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + std::hash::Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

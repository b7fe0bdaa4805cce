//! Configuration store: the relay, broadcast and RSS link tables.
//!
//! Every mutation validates first, writes a candidate copy of the affected
//! table to the document store, and only then swaps it in. A rejected or
//! failed write leaves both the persisted and the in-memory table untouched.

use crate::index::LiveChannelIndex;
use crate::validator::DerivedState;
use multiway_types::channel::ChannelId;
use multiway_types::error::{RelayError, RelayResult};
use multiway_types::relay::{
    normalize_relay_name, unique_in_order, BroadcastTable, RelayEntry, RelayTable, RssSettings,
    BROADCASTS_DOCUMENT, MIN_RELAY_CHANNELS, RELAYS_DOCUMENT, RSS_DOCUMENT,
};
use multiway_types::storage::DocumentStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a relay create/extend/shrink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayChange {
    pub name: String,
    /// Members as persisted after the change.
    pub members: Vec<ChannelId>,
    /// Channels already active in some relay. Advisory only.
    pub overlapping: Vec<ChannelId>,
}

/// Result of a broadcast mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastChange {
    Configured {
        source: ChannelId,
        destinations: BTreeSet<ChannelId>,
    },
    Removed {
        source: ChannelId,
    },
}

/// One line of the relay listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySummary {
    pub name: String,
    pub members: Vec<ChannelId>,
    /// Whether the relay currently routes (two or more live members).
    pub active: bool,
}

/// Owns the three persisted routing tables.
pub struct ConfigStore {
    backend: Arc<dyn DocumentStore>,
    relays: RelayTable,
    broadcasts: BroadcastTable,
    rss: RssSettings,
}

impl ConfigStore {
    /// Load all three tables. Missing or unreadable documents start empty.
    pub fn load(backend: Arc<dyn DocumentStore>) -> Self {
        let relays: RelayTable = load_document(backend.as_ref(), RELAYS_DOCUMENT);
        let broadcasts: BroadcastTable = load_document(backend.as_ref(), BROADCASTS_DOCUMENT);
        let rss: RssSettings = load_document(backend.as_ref(), RSS_DOCUMENT);
        info!(
            relays = relays.len(),
            broadcasts = broadcasts.len(),
            rss_links = rss.links.len(),
            "Loaded relay configuration"
        );
        Self {
            backend,
            relays,
            broadcasts,
            rss,
        }
    }

    pub fn relays(&self) -> &RelayTable {
        &self.relays
    }

    pub fn broadcasts(&self) -> &BroadcastTable {
        &self.broadcasts
    }

    pub fn rss(&self) -> &RssSettings {
        &self.rss
    }

    /// Create a relay from at least two distinct live channels.
    pub fn create_relay(
        &mut self,
        name: &str,
        candidates: &[ChannelId],
        index: &LiveChannelIndex,
        state: &DerivedState,
    ) -> RelayResult<RelayChange> {
        let name = validated_name(name)?;
        if self.relays.contains_key(&name) {
            return Err(RelayError::NameInUse(name));
        }

        let members = unique_in_order(index.retain_live(candidates));
        if members.len() < MIN_RELAY_CHANNELS {
            return Err(RelayError::InsufficientChannels {
                found: members.len(),
            });
        }
        let overlapping = state.overlapping(&members);

        let mut relays = self.relays.clone();
        relays.insert(name.clone(), RelayEntry::new(members.clone()));
        self.persist(RELAYS_DOCUMENT, &relays)?;
        self.relays = relays;

        info!(relay = %name, members = members.len(), "Relay formed");
        Ok(RelayChange {
            name,
            members,
            overlapping,
        })
    }

    /// Add channels to an existing relay. Dead members are dropped on the way.
    pub fn extend_relay(
        &mut self,
        name: &str,
        candidates: &[ChannelId],
        index: &LiveChannelIndex,
        state: &DerivedState,
    ) -> RelayResult<RelayChange> {
        let name = normalize_relay_name(name);
        let existing = self
            .relays
            .get(&name)
            .ok_or_else(|| RelayError::NotFound(name.clone()))?;

        let combined = existing.channels.iter().chain(candidates.iter());
        let members = unique_in_order(index.retain_live(combined));
        let added: Vec<ChannelId> = members
            .iter()
            .filter(|id| !existing.contains(id))
            .cloned()
            .collect();
        let overlapping = state.overlapping(&added);

        let mut relays = self.relays.clone();
        relays.insert(name.clone(), RelayEntry::new(members.clone()));
        self.persist(RELAYS_DOCUMENT, &relays)?;
        self.relays = relays;

        info!(relay = %name, added = added.len(), "Relay extended");
        Ok(RelayChange {
            name,
            members,
            overlapping,
        })
    }

    /// Remove channels from a relay. May leave it below two members.
    pub fn shrink_relay(&mut self, name: &str, remove: &[ChannelId]) -> RelayResult<RelayChange> {
        let name = normalize_relay_name(name);
        let existing = self
            .relays
            .get(&name)
            .ok_or_else(|| RelayError::NotFound(name.clone()))?;

        let members: Vec<ChannelId> = existing
            .channels
            .iter()
            .filter(|id| !remove.contains(id))
            .cloned()
            .collect();

        let mut relays = self.relays.clone();
        relays.insert(name.clone(), RelayEntry::new(members.clone()));
        self.persist(RELAYS_DOCUMENT, &relays)?;
        self.relays = relays;

        if members.len() < MIN_RELAY_CHANNELS {
            warn!(relay = %name, members = members.len(), "Relay shrunk below routable size");
        }
        Ok(RelayChange {
            name,
            members,
            overlapping: Vec::new(),
        })
    }

    /// Delete a relay by name, returning its last configuration.
    pub fn remove_relay(&mut self, name: &str) -> RelayResult<RelayEntry> {
        let name = normalize_relay_name(name);
        let mut relays = self.relays.clone();
        let removed = relays
            .remove(&name)
            .ok_or_else(|| RelayError::NotFound(name.clone()))?;
        self.persist(RELAYS_DOCUMENT, &relays)?;
        self.relays = relays;

        info!(relay = %name, "Relay removed");
        Ok(removed)
    }

    /// Every configured relay, including ones that currently do not route.
    pub fn list_relays(&self, state: &DerivedState) -> Vec<RelaySummary> {
        self.relays
            .iter()
            .map(|(name, entry)| RelaySummary {
                name: name.clone(),
                members: entry.channels.clone(),
                active: state.is_relay_active(name),
            })
            .collect()
    }

    /// Configure a broadcast, or remove it when `destinations` is empty.
    pub fn set_broadcast(
        &mut self,
        source: &ChannelId,
        destinations: &[ChannelId],
        index: &LiveChannelIndex,
    ) -> RelayResult<BroadcastChange> {
        if destinations.is_empty() {
            return self.clear_broadcast(source);
        }

        if let Some(unknown) = std::iter::once(source)
            .chain(destinations.iter())
            .find(|id| !index.contains(id))
        {
            return Err(RelayError::UnknownChannel(unknown.clone()));
        }

        self.commit_broadcast(source, destinations.iter().cloned())
    }

    /// Remove a broadcast entry.
    pub fn clear_broadcast(&mut self, source: &ChannelId) -> RelayResult<BroadcastChange> {
        let mut broadcasts = self.broadcasts.clone();
        if broadcasts.remove(source).is_none() {
            return Err(RelayError::NoBroadcastToRemove(source.clone()));
        }
        self.persist(BROADCASTS_DOCUMENT, &broadcasts)?;
        self.broadcasts = broadcasts;

        info!(source = %source, "Broadcast removed");
        Ok(BroadcastChange::Removed {
            source: source.clone(),
        })
    }

    /// Point a broadcast at every channel the announcer has subscribed.
    ///
    /// Subscriptions are taken as-is; unreachable ones are skipped at routing
    /// time like any other dead destination.
    pub fn import_broadcast(
        &mut self,
        source: &ChannelId,
        subscribed: Vec<ChannelId>,
    ) -> RelayResult<BroadcastChange> {
        self.commit_broadcast(source, subscribed)
    }

    /// Map a feed listener channel to a broadcast key. Unconditional upsert.
    pub fn add_rss_link(
        &mut self,
        listener: &ChannelId,
        broadcast_key: &ChannelId,
    ) -> RelayResult<()> {
        let mut rss = self.rss.clone();
        rss.links.insert(listener.clone(), broadcast_key.clone());
        self.persist(RSS_DOCUMENT, &rss)?;
        self.rss = rss;

        info!(listener = %listener, broadcast_key = %broadcast_key, "RSS listener added");
        Ok(())
    }

    fn commit_broadcast(
        &mut self,
        source: &ChannelId,
        destinations: impl IntoIterator<Item = ChannelId>,
    ) -> RelayResult<BroadcastChange> {
        let destinations: BTreeSet<ChannelId> = destinations
            .into_iter()
            .filter(|id| id != source)
            .collect();
        if destinations.is_empty() {
            return Err(RelayError::EmptyAfterFilter);
        }

        let mut broadcasts = self.broadcasts.clone();
        broadcasts.insert(source.clone(), destinations.clone());
        self.persist(BROADCASTS_DOCUMENT, &broadcasts)?;
        self.broadcasts = broadcasts;

        info!(source = %source, destinations = destinations.len(), "Broadcast configured");
        Ok(BroadcastChange::Configured {
            source: source.clone(),
            destinations,
        })
    }

    fn persist<T: Serialize>(&self, key: &str, table: &T) -> RelayResult<()> {
        let value =
            serde_json::to_value(table).map_err(|e| RelayError::Serialization(e.to_string()))?;
        self.backend.save(key, value)
    }
}

fn validated_name(name: &str) -> RelayResult<String> {
    let name = normalize_relay_name(name);
    if name.is_empty() {
        return Err(RelayError::InvalidName);
    }
    Ok(name)
}

/// Load one table, treating a missing or corrupt document as empty.
fn load_document<T: DeserializeOwned + Default>(backend: &dyn DocumentStore, key: &str) -> T {
    match backend.load(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(table) => table,
            Err(e) => {
                warn!(document = key, error = %e, "Corrupt document, starting empty");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            warn!(document = key, error = %e, "Failed to read document, starting empty");
            T::default()
        }
    }
}

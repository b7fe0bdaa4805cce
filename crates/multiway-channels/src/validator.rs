//! Derived routing state: which relays are live right now.

use crate::index::LiveChannelIndex;
use multiway_types::channel::ChannelId;
use multiway_types::relay::{RelayTable, MIN_RELAY_CHANNELS};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Routing state derived from the relay table and a live channel index.
///
/// Relays with fewer than two live members stay in the configuration but are
/// left out of `active_relays`, so they route nothing until channels return.
#[derive(Debug, Clone, Default)]
pub struct DerivedState {
    index: LiveChannelIndex,
    active_relays: BTreeMap<String, Vec<ChannelId>>,
    active_channels: HashSet<ChannelId>,
}

impl DerivedState {
    /// Full recomputation from scratch; no incremental diffing.
    pub fn rebuild(index: LiveChannelIndex, relays: &RelayTable) -> Self {
        let mut active_relays = BTreeMap::new();
        let mut active_channels = HashSet::new();

        for (name, entry) in relays {
            let live = index.retain_live(&entry.channels);
            if live.len() < MIN_RELAY_CHANNELS {
                debug!(
                    relay = %name,
                    live = live.len(),
                    configured = entry.channels.len(),
                    "Relay below minimum live members, excluded from routing"
                );
                continue;
            }
            active_channels.extend(live.iter().cloned());
            active_relays.insert(name.clone(), live);
        }

        debug!(
            channels = index.len(),
            relays = active_relays.len(),
            "Rebuilt routing state"
        );

        Self {
            index,
            active_relays,
            active_channels,
        }
    }

    /// Live channel index this state was built from.
    pub fn index(&self) -> &LiveChannelIndex {
        &self.index
    }

    /// Active membership of each routable relay.
    pub fn active_relays(&self) -> &BTreeMap<String, Vec<ChannelId>> {
        &self.active_relays
    }

    pub fn is_relay_active(&self, name: &str) -> bool {
        self.active_relays.contains_key(name)
    }

    /// Whether a channel takes part in any routable relay.
    pub fn is_channel_active(&self, id: &ChannelId) -> bool {
        self.active_channels.contains(id)
    }

    /// Candidates already active in some relay, for the overlap warning.
    pub fn overlapping<'a, I>(&self, candidates: I) -> Vec<ChannelId>
    where
        I: IntoIterator<Item = &'a ChannelId>,
    {
        candidates
            .into_iter()
            .filter(|id| self.active_channels.contains(*id))
            .cloned()
            .collect()
    }

    /// Drop a relay from routing immediately, ahead of the next rebuild.
    pub fn purge_relay(&mut self, name: &str) {
        if self.active_relays.remove(name).is_some() {
            self.active_channels = self.active_relays.values().flatten().cloned().collect();
        }
    }
}

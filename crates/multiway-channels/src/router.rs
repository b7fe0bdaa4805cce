//! Message router: decides where an inbound message goes.
//!
//! Routing never mutates configuration; it reads the derived relay state and
//! the raw broadcast and RSS tables.

use crate::formatter::{FEED_RELOAD_PLACEHOLDER, FEED_SENTINEL};
use crate::validator::DerivedState;
use multiway_types::channel::{ChannelId, UserId};
use multiway_types::message::InboundMessage;
use multiway_types::relay::{BroadcastTable, RssSettings};
use std::collections::BTreeSet;

/// How the outgoing copy is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    /// Rich embed naming the original author (user messages).
    Embed,
    /// Plain text with the feed marker swapped (feed posts).
    RawForward,
}

/// A routing decision for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    pub destinations: BTreeSet<ChannelId>,
    pub mode: RouteMode,
}

/// Why a message produced no dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Our own message without the feed sentinel.
    OwnMessage,
    /// The feed reader's empty reload artifact.
    FeedReloadPlaceholder,
    /// Feed post from a channel with no RSS link.
    NoRssLink,
    /// Nothing configured routes from this channel.
    NoDestinations,
}

/// Outcome of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Dispatch(RoutePlan),
    Skip(SkipReason),
}

/// Tables the router reads for a single decision.
pub struct RoutingTables<'a> {
    pub state: &'a DerivedState,
    pub broadcasts: &'a BroadcastTable,
    pub rss: &'a RssSettings,
}

impl RoutingTables<'_> {
    /// Route an inbound message.
    pub fn route(&self, message: &InboundMessage, self_id: &UserId) -> RouteDecision {
        let source = &message.channel.id;

        let (destinations, mode) = if &message.author.id != self_id {
            (self.user_destinations(source), RouteMode::Embed)
        } else {
            if !message.content.starts_with(FEED_SENTINEL) {
                return RouteDecision::Skip(SkipReason::OwnMessage);
            }
            if message.content == FEED_RELOAD_PLACEHOLDER {
                return RouteDecision::Skip(SkipReason::FeedReloadPlaceholder);
            }
            let Some(key) = self.rss.broadcast_key(source) else {
                return RouteDecision::Skip(SkipReason::NoRssLink);
            };
            (self.broadcast_destinations(key), RouteMode::RawForward)
        };

        if destinations.is_empty() {
            return RouteDecision::Skip(SkipReason::NoDestinations);
        }
        RouteDecision::Dispatch(RoutePlan { destinations, mode })
    }

    /// Relay peers across every relay the source is in, plus its broadcast.
    fn user_destinations(&self, source: &ChannelId) -> BTreeSet<ChannelId> {
        let mut destinations: BTreeSet<ChannelId> = self
            .state
            .active_relays()
            .values()
            .filter(|members| members.contains(source))
            .flatten()
            .filter(|member| *member != source)
            .cloned()
            .collect();
        destinations.extend(self.broadcast_destinations(source));
        destinations
    }

    /// Broadcast targets for a key that are still live.
    fn broadcast_destinations(&self, key: &ChannelId) -> BTreeSet<ChannelId> {
        self.broadcasts
            .get(key)
            .map(|dests| {
                dests
                    .iter()
                    .filter(|d| self.state.index().contains(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

//! Host platform contract.
//!
//! Implemented by thin adapters over a chat platform SDK; the relay engine
//! only ever talks to the platform through this trait.

use async_trait::async_trait;
use futures::Stream;
use multiway_types::channel::{ChannelId, ChannelInfo, UserId};
use multiway_types::message::{InboundMessage, OutboundPayload};
use std::pin::Pin;

/// Error returned by platform calls.
pub type PlatformError = Box<dyn std::error::Error + Send + Sync>;

/// Stream of inbound message events.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Capabilities the relay needs from a chat platform.
#[async_trait]
pub trait RelayPlatform: Send + Sync {
    /// Human-readable adapter name, used in logs.
    fn name(&self) -> &str;

    /// Identity the relay itself posts as.
    fn self_user_id(&self) -> UserId;

    /// Start receiving messages. Called once per bridge.
    async fn start(&self) -> Result<MessageStream, PlatformError>;

    /// Every channel currently reachable, of any kind.
    async fn channels(&self) -> Result<Vec<ChannelInfo>, PlatformError>;

    /// Send a payload to a channel. Fails if the channel is unreachable.
    async fn send(
        &self,
        channel: &ChannelId,
        payload: OutboundPayload,
    ) -> Result<(), PlatformError>;
}

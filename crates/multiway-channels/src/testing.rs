//! In-memory platform for unit tests.

use crate::types::{MessageStream, PlatformError, RelayPlatform};
use async_trait::async_trait;
use chrono::Utc;
use multiway_types::channel::{ChannelId, ChannelInfo, GuildInfo, UserId};
use multiway_types::message::{InboundMessage, MessageAuthor, OutboundPayload};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const BOT: &str = "bot";

pub struct MockPlatform {
    channels: Mutex<Vec<ChannelInfo>>,
    failing: Mutex<HashSet<ChannelId>>,
    enumeration_fails: AtomicBool,
    sent: Mutex<Vec<(ChannelId, OutboundPayload)>>,
    tx: mpsc::Sender<InboundMessage>,
    rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
}

impl MockPlatform {
    pub fn new(live: &[&str]) -> Self {
        let (tx, rx) = mpsc::channel(16);
        let guild = GuildInfo {
            name: "Test Guild".to_string(),
            icon_url: None,
        };
        let channels = live
            .iter()
            .map(|id| ChannelInfo {
                guild: Some(guild.clone()),
                ..ChannelInfo::text(*id, *id)
            })
            .collect();
        Self {
            channels: Mutex::new(channels),
            failing: Mutex::new(HashSet::new()),
            enumeration_fails: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn fail_sends_to(&self, channel: &str) {
        self.failing.lock().unwrap().insert(ChannelId::from(channel));
    }

    /// Drop a channel from enumeration, as if it were deleted.
    pub fn remove_channel(&self, channel: &str) {
        self.channels.lock().unwrap().retain(|c| c.id.as_str() != channel);
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.enumeration_fails.store(fail, Ordering::SeqCst);
    }

    pub fn message(&self, channel: &str, author: &str, content: &str) -> InboundMessage {
        let channel = self
            .channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id.as_str() == channel)
            .cloned()
            .unwrap_or_else(|| ChannelInfo::text(channel, channel));
        InboundMessage {
            id: format!("{}-{}", channel.id, content.len()),
            channel,
            author: MessageAuthor {
                id: UserId::new(author),
                display_name: author.to_string(),
                avatar_url: None,
                default_avatar_url: "https://cdn.example/default.png".to_string(),
                color: None,
            },
            content: content.to_string(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            role_mentions: Vec::new(),
        }
    }

    /// Feed a message into the stream returned by `start`.
    pub fn push(&self, message: InboundMessage) {
        self.tx.try_send(message).unwrap();
    }

    pub fn sent(&self) -> Vec<(ChannelId, OutboundPayload)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self, channel: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| c.as_str() == channel)
            .filter_map(|(_, p)| p.as_text().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl RelayPlatform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    fn self_user_id(&self) -> UserId {
        UserId::new(BOT)
    }

    async fn start(&self) -> Result<MessageStream, PlatformError> {
        let rx = self.rx.lock().unwrap().take().ok_or("already started")?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn channels(&self) -> Result<Vec<ChannelInfo>, PlatformError> {
        if self.enumeration_fails.load(Ordering::SeqCst) {
            return Err("gateway unavailable".into());
        }
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn send(
        &self,
        channel: &ChannelId,
        payload: OutboundPayload,
    ) -> Result<(), PlatformError> {
        if self.failing.lock().unwrap().contains(channel) {
            return Err(format!("missing permissions in {channel}").into());
        }
        self.sent.lock().unwrap().push((channel.clone(), payload));
        Ok(())
    }
}

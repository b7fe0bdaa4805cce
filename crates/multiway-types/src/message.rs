//! Inbound message events and outbound payloads.

use crate::channel::{ChannelInfo, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author metadata attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: UserId,
    pub display_name: String,
    /// Custom avatar, if the user has one.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Platform-generated avatar used when no custom one is set.
    #[serde(default)]
    pub default_avatar_url: String,
    /// Role colour as a 24-bit RGB value.
    #[serde(default)]
    pub color: Option<u32>,
}

impl MessageAuthor {
    /// The avatar to display: custom if set, otherwise the default.
    pub fn effective_avatar(&self) -> &str {
        self.avatar_url
            .as_deref()
            .unwrap_or(&self.default_avatar_url)
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

/// A role referenced by a `<@&ID>` token in the message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMention {
    pub id: String,
    pub name: String,
}

/// A message event delivered by the host platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub channel: ChannelInfo,
    pub author: MessageAuthor,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub role_mentions: Vec<RoleMention>,
}

/// A named field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Rich message card used for relayed user messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    pub author_name: String,
    pub author_icon_url: String,
    pub color: Option<u32>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub footer_text: String,
    pub footer_icon_url: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

/// What actually gets sent to a destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundPayload {
    Embed(Embed),
    Text(String),
}

impl OutboundPayload {
    /// Plain text body, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutboundPayload::Text(t) => Some(t),
            OutboundPayload::Embed(_) => None,
        }
    }

    /// Embed body, if this is an embed payload.
    pub fn as_embed(&self) -> Option<&Embed> {
        match self {
            OutboundPayload::Embed(e) => Some(e),
            OutboundPayload::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_avatar_falls_back_to_default() {
        let mut author = MessageAuthor {
            id: UserId::new("1"),
            display_name: "sinbad".to_string(),
            avatar_url: None,
            default_avatar_url: "https://cdn.example/default.png".to_string(),
            color: None,
        };
        assert_eq!(author.effective_avatar(), "https://cdn.example/default.png");

        author.avatar_url = Some("https://cdn.example/custom.png".to_string());
        assert_eq!(author.effective_avatar(), "https://cdn.example/custom.png");
    }

    #[test]
    fn test_payload_accessors() {
        let text = OutboundPayload::Text("hi".to_string());
        assert_eq!(text.as_text(), Some("hi"));
        assert!(text.as_embed().is_none());
    }
}

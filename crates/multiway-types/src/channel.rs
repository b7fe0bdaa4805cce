//! Channel and user identity types.

use serde::{Deserialize, Serialize};

/// Platform-assigned channel identifier.
///
/// Opaque: only equality, ordering and hashing are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Platform-assigned user identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a platform channel. Only text channels take part in relaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Text,
    Voice,
    Category,
    Other,
}

impl ChannelKind {
    pub fn is_text(self) -> bool {
        matches!(self, ChannelKind::Text)
    }
}

/// Server ("guild") a channel belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuildInfo {
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// A reachable channel as reported by the host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
    /// `None` for direct-message channels.
    #[serde(default)]
    pub guild: Option<GuildInfo>,
}

impl ChannelInfo {
    /// Convenience constructor for a guild-less text channel.
    pub fn text(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ChannelId::new(id),
            name: name.into(),
            kind: ChannelKind::Text,
            guild: None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind.is_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_serializes_as_plain_string() {
        let id = ChannelId::new("133049272517001216");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"133049272517001216\"");
        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_channel_kind_defaults_to_text() {
        let info: ChannelInfo = serde_json::from_str(r#"{"id":"1","name":"general"}"#).unwrap();
        assert!(info.is_text());
        assert!(info.guild.is_none());
        assert!(!ChannelKind::Voice.is_text());
    }
}

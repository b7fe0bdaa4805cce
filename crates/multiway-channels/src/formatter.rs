//! Turns inbound messages into outbound payloads.
//!
//! User messages become embeds that carry the original author, server and
//! channel. Feed posts are forwarded as plain text with their marker swapped.

use multiway_types::message::{Embed, EmbedField, InboundMessage, OutboundPayload};
use regex_lite::{Captures, Regex};
use std::collections::HashMap;
use tracing::warn;

/// Zero-width space that marks a feed post written by the relay's own feed reader.
pub const FEED_SENTINEL: char = '\u{200B}';

/// Zero-width non-joiner that marks text already forwarded by the relay.
pub const FORWARDED_MARKER: char = '\u{200C}';

/// What the feed reader posts when it reloads with nothing to say.
pub const FEED_RELOAD_PLACEHOLDER: &str = "\u{200B}None";

/// Attachment extensions rendered inline as an image.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

const ATTACHMENT_FIELD_NAME: &str = "Message has an attachment";

/// Rewrite `<@&ID>` role mentions to plain `@RoleName`.
///
/// All mentioned roles are replaced in a single pass, so the result does not
/// depend on role order and a second application changes nothing. Messages
/// outside a server are returned unchanged.
pub fn cleanup_role_mentions(message: &InboundMessage) -> String {
    if message.channel.guild.is_none() || message.role_mentions.is_empty() {
        return message.content.clone();
    }

    let transformations: HashMap<String, String> = message
        .role_mentions
        .iter()
        .map(|role| (format!("<@&{}>", role.id), format!("@{}", role.name)))
        .collect();

    let alternation = transformations
        .keys()
        .map(|token| regex_lite::escape(token))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = match Regex::new(&alternation) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "Failed to build role mention pattern, leaving content as is");
            return message.content.clone();
        }
    };

    pattern
        .replace_all(&message.content, |caps: &Captures<'_>| {
            transformations.get(&caps[0]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// How an attachment is shown in an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentRendering {
    /// Shown inline as the embed image.
    InlineImage { url: String },
    /// Shown as a named markdown link field.
    LinkField { filename: String, url: String },
}

/// Classify an attachment by its (case-insensitive) file extension.
pub fn classify_attachment(filename: &str, url: &str) -> AttachmentRendering {
    let is_image = filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);

    if is_image {
        AttachmentRendering::InlineImage {
            url: url.to_string(),
        }
    } else {
        AttachmentRendering::LinkField {
            filename: filename.to_string(),
            url: url.to_string(),
        }
    }
}

/// Build the embed used to relay a user-authored message.
///
/// Only the first attachment is carried over.
pub fn build_embed(message: &InboundMessage) -> Embed {
    let channel = &message.channel;
    let (server_name, server_icon) = match &channel.guild {
        Some(guild) => (guild.name.as_str(), guild.icon_url.clone()),
        None => ("Direct Messages", None),
    };

    let mut embed = Embed {
        author_name: message.author.display_name.clone(),
        author_icon_url: message.author.effective_avatar().to_string(),
        color: message.author.color,
        timestamp: message.timestamp,
        description: cleanup_role_mentions(message),
        footer_text: format!("Said in {} #{}", server_name, channel.name),
        footer_icon_url: server_icon,
        image_url: None,
        fields: Vec::new(),
    };

    if let Some(attachment) = message.attachments.first() {
        match classify_attachment(&attachment.filename, &attachment.url) {
            AttachmentRendering::InlineImage { url } => embed.image_url = Some(url),
            AttachmentRendering::LinkField { filename, url } => embed.fields.push(EmbedField {
                name: ATTACHMENT_FIELD_NAME.to_string(),
                value: format!("[{filename}]({url})"),
                inline: true,
            }),
        }
    }

    embed
}

/// Build the plain-text copy of a feed post.
///
/// The leading feed sentinel is replaced with [`FORWARDED_MARKER`] so the
/// copy is never mistaken for a fresh feed post.
pub fn build_forward_text(message: &InboundMessage) -> String {
    let cleaned = cleanup_role_mentions(message);
    let body = cleaned.strip_prefix(FEED_SENTINEL).unwrap_or(&cleaned);
    format!("{FORWARDED_MARKER}{body}")
}

/// Payload for a user-authored message.
pub fn embed_payload(message: &InboundMessage) -> OutboundPayload {
    OutboundPayload::Embed(build_embed(message))
}

/// Payload for a feed post.
pub fn forward_payload(message: &InboundMessage) -> OutboundPayload {
    OutboundPayload::Text(build_forward_text(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use multiway_types::channel::{ChannelInfo, GuildInfo, UserId};
    use multiway_types::message::{Attachment, MessageAuthor, RoleMention};

    fn guild_message(content: &str) -> InboundMessage {
        let mut channel = ChannelInfo::text("100", "general");
        channel.guild = Some(GuildInfo {
            name: "Red".to_string(),
            icon_url: Some("https://cdn.example/red.png".to_string()),
        });
        InboundMessage {
            id: "m1".to_string(),
            channel,
            author: MessageAuthor {
                id: UserId::new("7"),
                display_name: "Sinbad".to_string(),
                avatar_url: None,
                default_avatar_url: "https://cdn.example/default.png".to_string(),
                color: Some(0x3498db),
            },
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2017, 3, 1, 12, 0, 0).unwrap(),
            attachments: Vec::new(),
            role_mentions: Vec::new(),
        }
    }

    fn with_roles(mut msg: InboundMessage) -> InboundMessage {
        msg.role_mentions = vec![
            RoleMention {
                id: "1".to_string(),
                name: "mods".to_string(),
            },
            RoleMention {
                id: "12".to_string(),
                name: "admins".to_string(),
            },
        ];
        msg
    }

    #[test]
    fn test_cleanup_rewrites_every_role_mention() {
        let msg = with_roles(guild_message("ping <@&12> and <@&1>, again <@&12>"));
        assert_eq!(
            cleanup_role_mentions(&msg),
            "ping @admins and @mods, again @admins"
        );
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut msg = with_roles(guild_message("<@&1><@&12> hello"));
        let once = cleanup_role_mentions(&msg);
        msg.content = once.clone();
        assert_eq!(cleanup_role_mentions(&msg), once);
    }

    #[test]
    fn test_cleanup_leaves_unmentioned_tokens_and_dms_alone() {
        let msg = with_roles(guild_message("<@&99> stays"));
        assert_eq!(cleanup_role_mentions(&msg), "<@&99> stays");

        let mut dm = with_roles(guild_message("<@&1>"));
        dm.channel.guild = None;
        assert_eq!(cleanup_role_mentions(&dm), "<@&1>");
    }

    #[test]
    fn test_classify_attachment_by_extension() {
        assert_eq!(
            classify_attachment("photo.PNG", "https://x/photo.PNG"),
            AttachmentRendering::InlineImage {
                url: "https://x/photo.PNG".to_string()
            }
        );
        assert!(matches!(
            classify_attachment("report.pdf", "https://x/report.pdf"),
            AttachmentRendering::LinkField { .. }
        ));
        assert!(matches!(
            classify_attachment("README", "https://x/README"),
            AttachmentRendering::LinkField { .. }
        ));
    }

    #[test]
    fn test_embed_carries_author_and_footer() {
        let embed = build_embed(&guild_message("hello"));
        assert_eq!(embed.author_name, "Sinbad");
        assert_eq!(embed.author_icon_url, "https://cdn.example/default.png");
        assert_eq!(embed.color, Some(0x3498db));
        assert_eq!(embed.description, "hello");
        assert_eq!(embed.footer_text, "Said in Red #general");
        assert_eq!(
            embed.footer_icon_url.as_deref(),
            Some("https://cdn.example/red.png")
        );
        assert!(embed.image_url.is_none());
        assert!(embed.fields.is_empty());
    }

    #[test]
    fn test_embed_uses_first_attachment_only() {
        let mut msg = guild_message("files");
        msg.attachments = vec![
            Attachment {
                filename: "report.pdf".to_string(),
                url: "https://x/report.pdf".to_string(),
            },
            Attachment {
                filename: "cat.gif".to_string(),
                url: "https://x/cat.gif".to_string(),
            },
        ];
        let embed = build_embed(&msg);
        assert!(embed.image_url.is_none());
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields[0].name, "Message has an attachment");
        assert_eq!(embed.fields[0].value, "[report.pdf](https://x/report.pdf)");
    }

    #[test]
    fn test_embed_inlines_image_attachment() {
        let mut msg = guild_message("look");
        msg.attachments = vec![Attachment {
            filename: "photo.PNG".to_string(),
            url: "https://x/photo.PNG".to_string(),
        }];
        let embed = build_embed(&msg);
        assert_eq!(embed.image_url.as_deref(), Some("https://x/photo.PNG"));
        assert!(embed.fields.is_empty());
    }

    #[test]
    fn test_forward_text_swaps_marker() {
        let msg = with_roles(guild_message("\u{200B}New post for <@&1>"));
        assert_eq!(build_forward_text(&msg), "\u{200C}New post for @mods");
    }
}

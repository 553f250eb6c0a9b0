//! Platform-neutral views of Discord threads and messages.
//!
//! The gateway converts serenity models into these so that extraction and the
//! announcement engine can be exercised without a Discord connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::{Tag, TagSet};

/// File attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image"))
    }
}

/// Field of a rich embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// The parts of a rich embed the bridge reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub colour: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

/// Origin ("starter") message of a forum thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarterMessage {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

/// A forum thread as seen at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: u64,
    pub guild_id: u64,
    pub parent_id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ThreadSnapshot {
    /// Jump link to the thread. Always contains the thread id.
    pub fn link(&self) -> String {
        thread_link(self.guild_id, self.id)
    }

    pub fn tag_set(&self) -> TagSet {
        TagSet::normalize(&self.tags)
    }
}

pub fn thread_link(guild_id: u64, thread_id: u64) -> String {
    format!("https://discord.com/channels/{guild_id}/{thread_id}")
}

/// A message read back from a channel's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub id: u64,
    pub author_id: u64,
    pub content: String,
}

impl ChannelMessage {
    /// Whether this message was written by `self_id` and mentions `thread_id`.
    pub fn is_own_mention_of(&self, self_id: u64, thread_id: u64) -> bool {
        self.author_id == self_id && self.content.contains(&thread_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_contains_thread_id() {
        let thread = ThreadSnapshot {
            id: 1234567890,
            guild_id: 42,
            parent_id: Some(7),
            name: "Jeu [v1.0]".to_string(),
            tags: Vec::new(),
            created_at: None,
        };
        assert_eq!(thread.link(), "https://discord.com/channels/42/1234567890");
        assert!(thread.link().contains(&thread.id.to_string()));
    }

    #[test]
    fn attachment_image_detection() {
        let png = Attachment {
            url: "https://cdn/x.png".to_string(),
            content_type: Some("image/png".to_string()),
        };
        let zip = Attachment {
            url: "https://cdn/x.zip".to_string(),
            content_type: Some("application/zip".to_string()),
        };
        let unknown = Attachment {
            url: "https://cdn/x".to_string(),
            content_type: None,
        };
        assert!(png.is_image());
        assert!(!zip.is_image());
        assert!(!unknown.is_image());
    }

    #[test]
    fn own_mention_requires_author_and_id() {
        let msg = ChannelMessage {
            id: 1,
            author_id: 99,
            content: "see https://discord.com/channels/1/555".to_string(),
        };
        assert!(msg.is_own_mention_of(99, 555));
        assert!(!msg.is_own_mention_of(100, 555));
        assert!(!msg.is_own_mention_of(99, 556));
    }
}

//! serenity models to platform-neutral views.

use chrono::{DateTime, Utc};
use serenity::model::channel::{ForumEmoji, ForumTag, GuildChannel, Message};
use serenity::model::id::ForumTagId;
use serenity::model::Timestamp;
use tradbridge_core::{
    Attachment, ChannelMessage, Embed, EmbedField, StarterMessage, Tag, TagEmoji, ThreadSnapshot,
};

fn to_utc(ts: Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0)
}

pub(super) fn tag(forum_tag: &ForumTag) -> Tag {
    let emoji = match &forum_tag.emoji {
        Some(ForumEmoji::Name(glyph)) if !glyph.is_empty() => Some(TagEmoji::Unicode(glyph.clone())),
        Some(ForumEmoji::Id(id)) => Some(TagEmoji::Custom {
            id: id.get(),
            name: None,
        }),
        _ => None,
    };
    Tag {
        name: forum_tag.name.clone(),
        emoji,
    }
}

/// Resolve applied tag ids against the parent forum's tag list. Unknown ids
/// are dropped.
pub(super) fn applied_tags(applied: &[ForumTagId], available: &[ForumTag]) -> Vec<Tag> {
    applied
        .iter()
        .filter_map(|id| available.iter().find(|t| t.id == *id))
        .map(tag)
        .collect()
}

/// Tag ids of the forum whose names match `names` (case-insensitive).
pub(super) fn tag_ids_by_name(names: &[String], available: &[ForumTag]) -> Vec<ForumTagId> {
    names
        .iter()
        .filter_map(|name| {
            let wanted = name.trim().to_lowercase();
            available
                .iter()
                .find(|t| t.name.trim().to_lowercase() == wanted)
                .map(|t| t.id)
        })
        .collect()
}

pub(super) fn thread(channel: &GuildChannel, forum_tags: &[ForumTag]) -> ThreadSnapshot {
    ThreadSnapshot {
        id: channel.id.get(),
        guild_id: channel.guild_id.get(),
        parent_id: channel.parent_id.map(|id| id.get()),
        name: channel.name.clone(),
        tags: applied_tags(&channel.applied_tags, forum_tags),
        created_at: channel
            .thread_metadata
            .as_ref()
            .and_then(|meta| meta.create_timestamp)
            .and_then(to_utc),
    }
}

pub(super) fn channel_message(message: &Message) -> ChannelMessage {
    ChannelMessage {
        id: message.id.get(),
        author_id: message.author.id.get(),
        content: message.content.clone(),
    }
}

pub(super) fn embed(embed: &serenity::model::channel::Embed) -> Embed {
    Embed {
        colour: embed.colour.map(|c| c.0),
        image_url: embed.image.as_ref().map(|i| i.url.clone()),
        thumbnail_url: embed.thumbnail.as_ref().map(|t| t.url.clone()),
        footer: embed.footer.as_ref().map(|f| f.text.clone()),
        fields: embed
            .fields
            .iter()
            .map(|f| EmbedField {
                name: f.name.clone(),
                value: f.value.clone(),
            })
            .collect(),
    }
}

pub(super) fn starter_message(message: &Message) -> StarterMessage {
    StarterMessage {
        id: message.id.get(),
        content: message.content.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| Attachment {
                url: a.url.clone(),
                content_type: a.content_type.clone(),
            })
            .collect(),
        embeds: message.embeds.iter().map(embed).collect(),
        author_name: Some(message.author.name.clone()),
        edited_at: message.edited_timestamp.and_then(to_utc),
    }
}

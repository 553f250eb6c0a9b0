use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};
use tradbridge_core::metadata::{
    METADATA_EMBED_COLOUR, METADATA_FIELD_NAME, chunk_payload, metadata_footer,
};
use tradbridge_core::{Announcement, MetadataError, PostMetadata};

pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Cover image and footer of an announcement.
pub(super) fn announcement_embed(message: &Announcement) -> CreateEmbed {
    let mut embed = CreateEmbed::new().colour(message.colour);
    if let Some(url) = &message.image_url {
        embed = embed.image(url);
    }
    if let Some(footer) = &message.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    embed
}

/// Invisible carrier embed holding the base64 metadata payload.
pub(super) fn metadata_embed(metadata: &PostMetadata) -> Result<CreateEmbed, MetadataError> {
    let chunks = chunk_payload(&metadata.to_base64()?);
    let mut embed = CreateEmbed::new()
        .colour(METADATA_EMBED_COLOUR)
        .footer(CreateEmbedFooter::new(metadata_footer(chunks.len())));
    for chunk in chunks {
        embed = embed.field(METADATA_FIELD_NAME, chunk, false);
    }
    Ok(embed)
}

/// Send an announcement, split on line boundaries when too long. The embed
/// rides on the first part. Returns the id of the first message.
pub async fn send_announcement(
    http: &Http,
    channel_id: ChannelId,
    message: &Announcement,
) -> serenity::Result<MessageId> {
    let mut chunks = split_message(&message.content).into_iter();
    let mut builder = CreateMessage::new().content(chunks.next().unwrap_or_default());
    if message.has_embed() {
        builder = builder.embed(announcement_embed(message));
    }
    let first = channel_id.send_message(http, builder).await?;
    for chunk in chunks {
        channel_id
            .send_message(http, CreateMessage::new().content(chunk))
            .await?;
    }
    Ok(first.id)
}

/// Split text into parts of at most [`DISCORD_MESSAGE_LIMIT`] characters,
/// preferring line boundaries and keeping code fences balanced.
pub fn split_message(content: &str) -> Vec<String> {
    if content.chars().count() <= DISCORD_MESSAGE_LIMIT {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut open_fence = false;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();
        if line_len > DISCORD_MESSAGE_LIMIT {
            // A single line longer than the limit: hard-split it.
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = line.chars().collect();
            for part in chars.chunks(DISCORD_MESSAGE_LIMIT) {
                chunks.push(part.iter().collect());
            }
            continue;
        }
        if current_len + line_len > DISCORD_MESSAGE_LIMIT - 4 && !current.is_empty() {
            if open_fence {
                current.push_str("\n```");
            }
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
            if open_fence {
                current.push_str("```\n");
                current_len = 4;
            }
        }
        current.push_str(line);
        current_len += line_len;
        if line.trim_start().starts_with("```") {
            open_fence = !open_fence;
        }
    }

    if !current.is_empty() {
        if open_fence {
            current.push_str("\n```");
        }
        chunks.push(current);
    }
    chunks
}

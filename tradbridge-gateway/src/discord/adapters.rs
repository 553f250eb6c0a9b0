//! serenity implementations of the collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{CreateEmbed, CreateForumPost, CreateMessage, EditMessage, EditThread, GetMessages};
use serenity::http::{Http, HttpError};
use serenity::model::channel::{ForumTag, GuildChannel};
use serenity::model::id::{ChannelId, MessageId};
use tracing::{debug, warn};
use tradbridge_core::message::thread_link;
use tradbridge_core::metadata::is_metadata_embed;
use tradbridge_core::{Announcement, ChannelMessage, StarterMessage, ThreadSnapshot};

use super::convert;
use super::send::{metadata_embed, send_announcement};
use crate::channel::{
    ChannelError, CreatedPost, ForumPosts, MessageChannel, NewPost, PostEdit, ThreadLabels,
    ThreadSource,
};

/// Archived threads read per listing, newest first.
const ARCHIVED_PAGE: u64 = 100;

fn is_not_found(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) if resp.status_code.as_u16() == 404
    )
}

async fn guild_channel(http: &Http, id: ChannelId) -> Result<Option<GuildChannel>, ChannelError> {
    match id.to_channel(http).await {
        Ok(channel) => Ok(channel.guild()),
        Err(err) if is_not_found(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn forum_tags(http: &Http, forum_id: Option<ChannelId>) -> Result<Vec<ForumTag>, ChannelError> {
    let Some(forum_id) = forum_id else {
        return Ok(Vec::new());
    };
    Ok(guild_channel(http, forum_id)
        .await?
        .map(|forum| forum.available_tags)
        .unwrap_or_default())
}

fn metadata_error(err: tradbridge_core::MetadataError) -> ChannelError {
    ChannelError::Metadata(err.to_string())
}

/// A text channel addressed by id.
pub struct DiscordChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordChannel {
    pub fn new(http: Arc<Http>, channel_id: u64) -> Self {
        Self {
            http,
            channel_id: ChannelId::new(channel_id),
        }
    }
}

#[async_trait]
impl MessageChannel for DiscordChannel {
    async fn recent_messages(&self, limit: u8) -> Result<Vec<ChannelMessage>, ChannelError> {
        let http: &Http = &self.http;
        let messages = self
            .channel_id
            .messages(http, GetMessages::new().limit(limit))
            .await?;
        Ok(messages.iter().map(convert::channel_message).collect())
    }

    async fn delete_message(&self, message_id: u64) -> Result<(), ChannelError> {
        let http: &Http = &self.http;
        self.channel_id
            .delete_message(http, MessageId::new(message_id))
            .await?;
        Ok(())
    }

    async fn send(&self, message: &Announcement) -> Result<u64, ChannelError> {
        let id = send_announcement(&self.http, self.channel_id, message).await?;
        Ok(id.get())
    }
}

/// Thread lookups through the REST API.
#[derive(Clone)]
pub struct DiscordThreads {
    http: Arc<Http>,
}

impl DiscordThreads {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    /// Snapshot of a thread received in a gateway event.
    pub async fn snapshot(&self, channel: &GuildChannel) -> Result<ThreadSnapshot, ChannelError> {
        let tags = forum_tags(&self.http, channel.parent_id).await?;
        Ok(convert::thread(channel, &tags))
    }

    /// Snapshots of two states of the same thread, resolving tags once.
    pub async fn snapshots(
        &self,
        old: Option<&GuildChannel>,
        new: &GuildChannel,
    ) -> Result<(Option<ThreadSnapshot>, ThreadSnapshot), ChannelError> {
        let tags = forum_tags(&self.http, new.parent_id).await?;
        Ok((
            old.map(|old| convert::thread(old, &tags)),
            convert::thread(new, &tags),
        ))
    }
}

#[async_trait]
impl ThreadSource for DiscordThreads {
    async fn current_thread(&self, thread_id: u64) -> Result<Option<ThreadSnapshot>, ChannelError> {
        match guild_channel(&self.http, ChannelId::new(thread_id)).await? {
            Some(channel) => self.snapshot(&channel).await.map(Some),
            None => Ok(None),
        }
    }

    async fn starter_message(&self, thread_id: u64) -> Result<Option<StarterMessage>, ChannelError> {
        let http: &Http = &self.http;
        // The starter message of a forum thread shares the thread's id.
        match ChannelId::new(thread_id)
            .message(http, MessageId::new(thread_id))
            .await
        {
            Ok(message) => Ok(Some(convert::starter_message(&message))),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn labels(&self, thread: &ThreadSnapshot) -> Result<ThreadLabels, ChannelError> {
        let mut labels = ThreadLabels::default();
        if let Some(parent_id) = thread.parent_id {
            labels.forum_name = guild_channel(&self.http, ChannelId::new(parent_id))
                .await?
                .map(|forum| forum.name);
        }

        let owner = guild_channel(&self.http, ChannelId::new(thread.id))
            .await?
            .and_then(|channel| channel.owner_id);
        if let Some(owner_id) = owner {
            let http: &Http = &self.http;
            match owner_id.to_user(http).await {
                Ok(user) => labels.author_name = Some(user.global_name.unwrap_or(user.name)),
                Err(err) => debug!(thread_id = thread.id, "thread owner lookup failed: {err}"),
            }
        }
        Ok(labels)
    }
}

/// Forum post management for the publisher API and the version checker.
#[derive(Clone)]
pub struct DiscordForum {
    http: Arc<Http>,
}

impl DiscordForum {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn forum(&self, forum_id: u64) -> Result<GuildChannel, ChannelError> {
        guild_channel(&self.http, ChannelId::new(forum_id))
            .await?
            .ok_or(ChannelError::NotText(forum_id))
    }
}

#[async_trait]
impl ForumPosts for DiscordForum {
    async fn list_threads(&self, forum_id: u64) -> Result<Vec<ThreadSnapshot>, ChannelError> {
        let http: &Http = &self.http;
        let forum = self.forum(forum_id).await?;
        let forum_channel = ChannelId::new(forum_id);

        let mut threads: Vec<ThreadSnapshot> = forum
            .guild_id
            .get_active_threads(http)
            .await?
            .threads
            .iter()
            .filter(|thread| thread.parent_id == Some(forum_channel))
            .map(|thread| convert::thread(thread, &forum.available_tags))
            .collect();

        match forum_channel
            .get_archived_public_threads(http, None, Some(ARCHIVED_PAGE))
            .await
        {
            Ok(archived) => {
                for thread in &archived.threads {
                    if threads.iter().all(|known| known.id != thread.id.get()) {
                        threads.push(convert::thread(thread, &forum.available_tags));
                    }
                }
            }
            Err(err) => warn!(forum_id, "failed to list archived threads: {err}"),
        }

        debug!(forum_id, count = threads.len(), "forum threads listed");
        Ok(threads)
    }

    async fn create_post(&self, forum_id: u64, post: &NewPost) -> Result<CreatedPost, ChannelError> {
        let http: &Http = &self.http;
        let forum = self.forum(forum_id).await?;

        let mut message = CreateMessage::new().content(post.content.clone());
        if let Some(metadata) = &post.metadata {
            message = message.embed(metadata_embed(metadata).map_err(metadata_error)?);
        }
        let mut builder = CreateForumPost::new(post.title.clone(), message);
        for tag_id in convert::tag_ids_by_name(&post.tags, &forum.available_tags) {
            builder = builder.add_applied_tag(tag_id);
        }

        let thread = ChannelId::new(forum_id).create_forum_post(http, builder).await?;
        Ok(CreatedPost {
            thread_id: thread.id.get(),
            message_id: thread.id.get(),
            thread_url: thread_link(thread.guild_id.get(), thread.id.get()),
        })
    }

    async fn edit_post(&self, thread_id: u64, edit: &PostEdit) -> Result<(), ChannelError> {
        let http: &Http = &self.http;
        let thread_channel = ChannelId::new(thread_id);

        if edit.title.is_some() || edit.tags.is_some() {
            let mut builder = EditThread::new();
            if let Some(title) = &edit.title {
                builder = builder.name(title.clone());
            }
            if let Some(names) = &edit.tags {
                let thread = guild_channel(&self.http, thread_channel)
                    .await?
                    .ok_or(ChannelError::NotText(thread_id))?;
                let available = forum_tags(&self.http, thread.parent_id).await?;
                builder = builder.applied_tags(convert::tag_ids_by_name(names, &available));
            }
            thread_channel.edit_thread(http, builder).await?;
        }

        if edit.content.is_some() || edit.metadata.is_some() {
            let starter_id = MessageId::new(thread_id);
            let mut builder = EditMessage::new();
            if let Some(content) = &edit.content {
                builder = builder.content(content.clone());
            }
            if let Some(metadata) = &edit.metadata {
                let current = thread_channel.message(http, starter_id).await?;
                let mut embeds: Vec<CreateEmbed> = current
                    .embeds
                    .iter()
                    .filter(|embed| !is_metadata_embed(&convert::embed(embed)))
                    .cloned()
                    .map(CreateEmbed::from)
                    .collect();
                embeds.push(metadata_embed(metadata).map_err(metadata_error)?);
                builder = builder.embeds(embeds);
            }
            thread_channel.edit_message(http, starter_id, builder).await?;
        }
        Ok(())
    }

    async fn delete_post(&self, thread_id: u64) -> Result<(), ChannelError> {
        let http: &Http = &self.http;
        ChannelId::new(thread_id).delete(http).await?;
        Ok(())
    }
}

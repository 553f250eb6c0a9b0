//! Collaborator seams over Discord.
//!
//! The announcement engine and the reminder bot only talk to Discord through
//! these traits. `crate::discord::adapters` implements them with serenity;
//! tests use in-memory fakes.

use async_trait::async_trait;
use tradbridge_core::{Announcement, ChannelMessage, PostMetadata, StarterMessage, ThreadSnapshot};

/// Errors reported by a collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("Discord API error: {0}")]
    Discord(String),

    #[error("Channel {0} is not a text channel")]
    NotText(u64),

    #[error("Invalid post metadata: {0}")]
    Metadata(String),
}

impl From<serenity::Error> for ChannelError {
    fn from(err: serenity::Error) -> Self {
        ChannelError::Discord(err.to_string())
    }
}

/// A text channel the bot reads back and writes to.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Up to `limit` most recent messages, newest first.
    async fn recent_messages(&self, limit: u8) -> Result<Vec<ChannelMessage>, ChannelError>;

    async fn delete_message(&self, message_id: u64) -> Result<(), ChannelError>;

    /// Send a message and return its id.
    async fn send(&self, message: &Announcement) -> Result<u64, ChannelError>;
}

/// Display names shown next to a thread in reminders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadLabels {
    pub forum_name: Option<String>,
    pub author_name: Option<String>,
}

/// Read access to forum threads.
#[async_trait]
pub trait ThreadSource: Send + Sync {
    /// The thread as it is now, `None` when it no longer exists.
    async fn current_thread(&self, thread_id: u64) -> Result<Option<ThreadSnapshot>, ChannelError>;

    /// The thread's starter message, `None` when it was deleted.
    async fn starter_message(&self, thread_id: u64)
    -> Result<Option<StarterMessage>, ChannelError>;

    /// Parent forum name and thread author.
    async fn labels(&self, thread: &ThreadSnapshot) -> Result<ThreadLabels, ChannelError>;
}

/// A forum post to create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    /// Tag names, resolved against the forum's available tags.
    pub tags: Vec<String>,
    pub metadata: Option<PostMetadata>,
}

/// Ids of a freshly created forum post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPost {
    pub thread_id: u64,
    pub message_id: u64,
    pub thread_url: String,
}

/// Changes to an existing post. `None` leaves the part untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<PostMetadata>,
}

impl PostEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none() && self.metadata.is_none()
    }
}

/// Write access to forum posts.
#[async_trait]
pub trait ForumPosts: Send + Sync {
    /// Active and archived threads of a forum.
    async fn list_threads(&self, forum_id: u64) -> Result<Vec<ThreadSnapshot>, ChannelError>;

    async fn create_post(&self, forum_id: u64, post: &NewPost) -> Result<CreatedPost, ChannelError>;

    async fn edit_post(&self, thread_id: u64, edit: &PostEdit) -> Result<(), ChannelError>;

    async fn delete_post(&self, thread_id: u64) -> Result<(), ChannelError>;
}

//! Publication reminders for the F95 forums.
//!
//! When a thread tagged as an update is created or edited, a reminder with
//! the expected publication date replaces the previous one for that thread
//! in the notification channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tradbridge_core::{Announcement, ReminderSettings, ThreadSnapshot, has_update_tag};

use crate::channel::{ChannelError, MessageChannel, ThreadLabels, ThreadSource};

const UNKNOWN_AUTHOR: &str = "Inconnu";
const UNKNOWN_FORUM: &str = "Forum";
const HISTORY_LIMIT: u8 = 50;

/// Render the reminder for `thread`, due at `publish_at`.
pub fn render_reminder(
    thread: &ThreadSnapshot,
    labels: &ThreadLabels,
    publish_at: DateTime<Utc>,
) -> Announcement {
    let author = labels.author_name.as_deref().unwrap_or(UNKNOWN_AUTHOR);
    let forum = labels.forum_name.as_deref().unwrap_or(UNKNOWN_FORUM);
    let ts = publish_at.timestamp();
    Announcement::text(format!(
        "**Pseudo :** {author}\n**{forum} :**\n[{}]({}) <t:{ts}:D> (<t:{ts}:R>)",
        thread.name,
        thread.link()
    ))
}

pub struct Reminder {
    channel: Arc<dyn MessageChannel>,
    threads: Arc<dyn ThreadSource>,
    self_id: u64,
    days_before: chrono::Duration,
    settle: Duration,
}

impl Reminder {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        threads: Arc<dyn ThreadSource>,
        self_id: u64,
        settings: &ReminderSettings,
    ) -> Self {
        Self {
            channel,
            threads,
            self_id,
            days_before: chrono::Duration::days(settings.days_before_publication),
            settle: Duration::from_secs(settings.settle_seconds),
        }
    }

    /// New thread: tags are only reliable once the settle delay has passed.
    pub async fn on_thread_created(&self, thread_id: u64) -> Result<Option<u64>, ChannelError> {
        tokio::time::sleep(self.settle).await;
        let Some(thread) = self.threads.current_thread(thread_id).await? else {
            return Ok(None);
        };
        self.remind_if_update(&thread, "thread_create").await
    }

    pub async fn on_thread_updated(
        &self,
        thread: &ThreadSnapshot,
    ) -> Result<Option<u64>, ChannelError> {
        self.remind_if_update(thread, "thread_update").await
    }

    pub async fn on_starter_edited(
        &self,
        thread: &ThreadSnapshot,
        content_changed: bool,
    ) -> Result<Option<u64>, ChannelError> {
        if !content_changed {
            return Ok(None);
        }
        self.remind_if_update(thread, "message_edit").await
    }

    async fn remind_if_update(
        &self,
        thread: &ThreadSnapshot,
        source: &'static str,
    ) -> Result<Option<u64>, ChannelError> {
        if !has_update_tag(&thread.tags) {
            debug!(thread_id = thread.id, source, "no update tag, no reminder");
            return Ok(None);
        }
        self.send(thread).await.map(Some)
    }

    /// Replace the thread's previous reminder with a fresh one.
    pub async fn send(&self, thread: &ThreadSnapshot) -> Result<u64, ChannelError> {
        self.delete_previous(thread.id).await;

        let labels = self.threads.labels(thread).await.unwrap_or_else(|err| {
            warn!(thread_id = thread.id, "failed to resolve reminder labels: {err}");
            ThreadLabels::default()
        });
        let reminder = render_reminder(thread, &labels, Utc::now() + self.days_before);
        let message_id = self.channel.send(&reminder).await?;

        info!(thread_id = thread.id, message_id, name = %thread.name, "reminder sent");
        Ok(message_id)
    }

    async fn delete_previous(&self, thread_id: u64) {
        let messages = match self.channel.recent_messages(HISTORY_LIMIT).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(thread_id, "failed to read reminder history: {err}");
                return;
            }
        };
        let Some(previous) = messages
            .iter()
            .find(|message| message.is_own_mention_of(self.self_id, thread_id))
        else {
            return;
        };
        match self.channel.delete_message(previous.id).await {
            Ok(()) => debug!(thread_id, message_id = previous.id, "previous reminder deleted"),
            Err(err) => warn!(thread_id, message_id = previous.id, "failed to delete previous reminder: {err}"),
        }
    }
}

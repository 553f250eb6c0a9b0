use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::model::channel::{GuildChannel, Message};
use serenity::model::event::MessageUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};
use tradbridge_core::ReminderSettings;

use super::adapters::{DiscordChannel, DiscordThreads};
use super::announcer::starter_edit;
use crate::channel::{ChannelError, ThreadSource};
use crate::reminder::Reminder;

fn log_result(thread_id: u64, result: Result<Option<u64>, ChannelError>) {
    match result {
        Ok(Some(message_id)) => debug!(thread_id, message_id, "reminder posted"),
        Ok(None) => {}
        Err(err) => error!(thread_id, "failed to send reminder: {err}"),
    }
}

struct Wired {
    reminder: Arc<Reminder>,
    threads: DiscordThreads,
}

/// F95 reminder bot, running on its own token.
pub struct ReminderBot {
    settings: ReminderSettings,
    wired: OnceLock<Wired>,
}

impl ReminderBot {
    pub fn new(settings: ReminderSettings) -> Self {
        Self {
            settings,
            wired: OnceLock::new(),
        }
    }

    fn watched(&self, parent_id: Option<u64>) -> bool {
        parent_id.is_some_and(|parent| self.settings.watches_forum(parent))
    }
}

#[async_trait]
impl EventHandler for ReminderBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Reminder bot connected as {}", ready.user.name);

        let Some(channel_id) = self.settings.notification_channel_id else {
            warn!("No reminder notification_channel_id configured, reminders disabled");
            return;
        };
        if self.wired.get().is_some() {
            return;
        }

        let threads = DiscordThreads::new(ctx.http.clone());
        let reminder = Reminder::new(
            Arc::new(DiscordChannel::new(ctx.http.clone(), channel_id)),
            Arc::new(threads.clone()),
            ready.user.id.get(),
            &self.settings,
        );
        let _ = self.wired.set(Wired {
            reminder: Arc::new(reminder),
            threads,
        });
    }

    async fn thread_create(&self, _ctx: Context, thread: GuildChannel) {
        let Some(wired) = self.wired.get() else {
            return;
        };
        if !self.watched(thread.parent_id.map(|id| id.get())) {
            return;
        }

        let reminder = wired.reminder.clone();
        let thread_id = thread.id.get();
        tokio::spawn(async move {
            log_result(thread_id, reminder.on_thread_created(thread_id).await);
        });
    }

    async fn thread_update(&self, _ctx: Context, old: Option<GuildChannel>, new: GuildChannel) {
        let Some(wired) = self.wired.get() else {
            return;
        };
        if !self.watched(new.parent_id.map(|id| id.get())) {
            return;
        }

        let (before, after) = match wired.threads.snapshots(old.as_ref(), &new).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(thread_id = new.id.get(), "failed to resolve thread tags: {err}");
                return;
            }
        };
        if before.is_some_and(|before| before.tag_set() == after.tag_set()) {
            return;
        }
        log_result(after.id, wired.reminder.on_thread_updated(&after).await);
    }

    async fn message_update(
        &self,
        _ctx: Context,
        old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let Some(wired) = self.wired.get() else {
            return;
        };
        let Some(content_changed) = starter_edit(&event, old_if_available.as_ref()) else {
            return;
        };

        let thread_id = event.channel_id.get();
        let thread = match wired.threads.current_thread(thread_id).await {
            Ok(Some(thread)) if self.watched(thread.parent_id) => thread,
            Ok(_) => return,
            Err(err) => {
                warn!(thread_id, "failed to read edited thread: {err}");
                return;
            }
        };
        log_result(
            thread_id,
            wired.reminder.on_starter_edited(&thread, content_changed).await,
        );
    }
}

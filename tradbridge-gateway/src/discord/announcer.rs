use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::model::channel::{GuildChannel, Message};
use serenity::model::event::MessageUpdateEvent;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info, warn};
use tradbridge_core::DiscordSettings;

use super::adapters::{DiscordChannel, DiscordThreads};
use crate::announce::{AnnounceError, Announcer, AnnouncerConfig, Outcome};
use crate::channel::ThreadSource;
use crate::state::AppState;

/// Whether an edit event targets a thread's starter message, and whether its
/// text changed. An unknown previous version counts as a change as soon as
/// the event carries content.
pub(super) fn starter_edit(
    event: &MessageUpdateEvent,
    old: Option<&Message>,
) -> Option<bool> {
    if event.id.get() != event.channel_id.get() {
        return None;
    }
    let changed = match (old, event.content.as_deref()) {
        (Some(old), Some(content)) => old.content != content,
        (None, Some(_)) => true,
        (_, None) => false,
    };
    Some(changed)
}

fn watched(settings: &DiscordSettings, channel: &GuildChannel) -> bool {
    channel
        .parent_id
        .is_some_and(|parent| settings.watches_forum(parent.get()))
}

fn log_outcome(thread_id: u64, result: Result<Outcome, AnnounceError>) {
    match result {
        Ok(outcome) => info!(thread_id, ?outcome, "announcement run finished"),
        Err(err) => error!(thread_id, "announcement failed: {err}"),
    }
}

struct Wired {
    announcer: Announcer,
    threads: DiscordThreads,
}

/// Announcer bot: turns forum thread events into announcements.
pub struct AnnouncerBot {
    state: Arc<AppState>,
    wired: OnceLock<Wired>,
}

impl AnnouncerBot {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            wired: OnceLock::new(),
        }
    }

    fn settings(&self) -> &DiscordSettings {
        &self.state.settings.discord
    }
}

#[async_trait]
impl EventHandler for AnnouncerBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Announcer bot connected as {}", ready.user.name);

        let Some(channel_id) = self.settings().announce_channel_id else {
            warn!("No announce_channel_id configured, announcements disabled");
            return;
        };
        if self.wired.get().is_some() {
            return;
        }

        let threads = DiscordThreads::new(ctx.http.clone());
        let announcer = Announcer::new(
            Arc::new(DiscordChannel::new(ctx.http.clone(), channel_id)),
            Arc::new(threads.clone()),
            ready.user.id.get(),
            AnnouncerConfig::from(&self.state.settings.announcer),
        );
        let _ = self.wired.set(Wired { announcer, threads });
        info!(channel_id, "announcement engine ready");
    }

    async fn thread_create(&self, _ctx: Context, thread: GuildChannel) {
        let Some(wired) = self.wired.get() else {
            return;
        };
        if !watched(self.settings(), &thread) {
            return;
        }

        info!(thread_id = thread.id.get(), name = %thread.name, "thread created");
        let announcer = wired.announcer.clone();
        let thread_id = thread.id.get();
        tokio::spawn(async move {
            log_outcome(thread_id, announcer.on_thread_created(thread_id).await);
        });
    }

    async fn thread_update(&self, _ctx: Context, old: Option<GuildChannel>, new: GuildChannel) {
        let Some(wired) = self.wired.get() else {
            return;
        };
        if !watched(self.settings(), &new) {
            return;
        }

        match wired.threads.snapshots(old.as_ref(), &new).await {
            Ok((before, after)) => {
                let before_tags = before.map(|thread| thread.tag_set());
                wired.announcer.on_thread_updated(before_tags.as_ref(), &after);
            }
            Err(err) => warn!(thread_id = new.id.get(), "failed to resolve thread tags: {err}"),
        }
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
            Ok(Some(thread)) => thread,
            Ok(None) => return,
            Err(err) => {
                warn!(thread_id, "failed to read edited thread: {err}");
                return;
            }
        };
        if !thread
            .parent_id
            .is_some_and(|parent| self.settings().watches_forum(parent))
        {
            return;
        }
        wired.announcer.on_starter_edited(&thread, content_changed);
    }
}

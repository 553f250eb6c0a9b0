mod adapters;
mod announcer;
mod convert;
mod reminder;
mod send;

use std::sync::Arc;

use serenity::prelude::*;
use tracing::info;
use tradbridge_core::ReminderSettings;

pub use adapters::{DiscordChannel, DiscordForum, DiscordThreads};
pub use announcer::AnnouncerBot;
pub use reminder::ReminderBot;
pub use send::{DISCORD_MESSAGE_LIMIT, send_announcement, split_message};

/// Messages kept per channel so edit events carry the previous content.
const CACHED_MESSAGES: usize = 100;

fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

fn cache_settings() -> serenity::cache::Settings {
    let mut settings = serenity::cache::Settings::default();
    settings.max_messages = CACHED_MESSAGES;
    settings
}

fn usable(token: Option<String>, name: &str) -> Option<String> {
    match token {
        Some(t) if !t.is_empty() => Some(t),
        _ => {
            info!("No {name} set, skipping bot");
            None
        }
    }
}

/// Start the announcer bot (optional - returns Ok(None) if no token).
///
/// The publisher API's forum access and the announcement channel are
/// attached to `state` as soon as the client exists.
pub async fn start_discord_bot(
    token: Option<String>,
    state: Arc<crate::state::AppState>,
) -> Result<Option<Client>, DiscordError> {
    let Some(token) = usable(token, "DISCORD_BOT_TOKEN") else {
        return Ok(None);
    };

    info!("Starting announcer bot...");
    let client = Client::builder(&token, intents())
        .event_handler(AnnouncerBot::new(Arc::clone(&state)))
        .cache_settings(cache_settings())
        .await
        .map_err(|e| DiscordError::ClientError(e.to_string()))?;

    let http = client.http.clone();
    let announcements = state
        .settings
        .discord
        .announce_channel_id
        .map(|id| Arc::new(DiscordChannel::new(http.clone(), id)) as Arc<dyn crate::channel::MessageChannel>);
    state.attach_discord(Arc::new(DiscordForum::new(http)), announcements);

    Ok(Some(client))
}

/// Start the F95 reminder bot (optional - returns Ok(None) if no token).
pub async fn start_reminder_bot(
    token: Option<String>,
    settings: ReminderSettings,
) -> Result<Option<Client>, DiscordError> {
    let Some(token) = usable(token, "REMINDER_DISCORD_TOKEN") else {
        return Ok(None);
    };

    info!("Starting reminder bot...");
    let client = Client::builder(&token, intents())
        .event_handler(ReminderBot::new(settings))
        .cache_settings(cache_settings())
        .await
        .map_err(|e| DiscordError::ClientError(e.to_string()))?;

    Ok(Some(client))
}

/// Discord-related errors
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("Failed to create Discord client: {0}")]
    ClientError(String),
}

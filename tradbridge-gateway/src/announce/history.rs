//! Look back through the announcement channel for a thread's prior
//! announcement.

use tracing::{debug, warn};
use tradbridge_core::{AnnouncementFormat, ChannelMessage};

use crate::channel::MessageChannel;

/// What the channel history says about a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryScan {
    pub already_published: bool,
    pub prior_game_version: Option<String>,
    pub prior_translation_version: Option<String>,
    /// The newest channel message was this thread's announcement and was removed.
    pub most_recent_was_deleted: bool,
    /// Older announcement of this thread still present in the channel.
    pub prior_message_id: Option<u64>,
}

impl HistoryScan {
    fn from_message(message: &ChannelMessage) -> Self {
        let prior = AnnouncementFormat::parse_prior(&message.content);
        Self {
            already_published: true,
            prior_game_version: prior.game_version,
            prior_translation_version: prior.translation_version,
            most_recent_was_deleted: false,
            prior_message_id: Some(message.id),
        }
    }
}

/// Scan the newest `limit` messages for the announcement of `thread_id`.
///
/// When the newest message of the channel is that announcement it is deleted
/// so that the replacement lands in the same spot, unless it already carries
/// exactly `details` (then nothing is deleted and the thread counts as
/// published). Otherwise the newest older match is reported and left alone.
///
/// Reading history never fails: an unreadable channel counts as empty.
pub async fn scan(
    channel: &dyn MessageChannel,
    self_id: u64,
    thread_id: u64,
    limit: u8,
    details: &str,
) -> HistoryScan {
    let messages = match channel.recent_messages(limit).await {
        Ok(messages) => messages,
        Err(err) => {
            warn!(thread_id, "failed to read announcement history: {err}");
            return HistoryScan::default();
        }
    };

    let Some((newest, older)) = messages.split_first() else {
        return HistoryScan::default();
    };

    if newest.is_own_mention_of(self_id, thread_id) {
        let mut scan = HistoryScan::from_message(newest);
        // A second run for an unchanged thread would otherwise delete and re-send the same text.
        if AnnouncementFormat::details_of(&newest.content) == details {
            debug!(thread_id, "latest announcement already up to date");
            return scan;
        }

        if let Err(err) = channel.delete_message(newest.id).await {
            warn!(thread_id, message_id = newest.id, "failed to delete previous announcement: {err}");
        }
        scan.most_recent_was_deleted = true;
        scan.prior_message_id = None;
        return scan;
    }

    older
        .iter()
        .find(|message| message.is_own_mention_of(self_id, thread_id))
        .map(HistoryScan::from_message)
        .unwrap_or_default()
}

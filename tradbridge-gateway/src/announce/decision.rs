use tradbridge_core::version::normalize_version;
use tradbridge_core::{ExtractedInfo, TagSet};

use super::history::HistoryScan;

/// Why nothing is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    NoTags,
    AlreadyPublished,
}

/// What to do with a thread's announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Suppress(SuppressReason),
    /// Send an update. `replace` is an older announcement to delete first.
    PublishUpdate { replace: Option<u64> },
    PublishNew,
}

fn differs(prior: Option<&str>, current: &str) -> bool {
    prior.is_some_and(|prior| normalize_version(prior) != normalize_version(current))
}

/// Decide between suppressing, replacing and publishing.
pub fn decide(tags: &TagSet, info: &ExtractedInfo, history: &HistoryScan) -> Decision {
    if tags.is_empty() {
        return Decision::Suppress(SuppressReason::NoTags);
    }

    let version_changed = differs(history.prior_game_version.as_deref(), &info.game_version)
        || differs(
            history.prior_translation_version.as_deref(),
            &info.translation_version,
        );

    if history.most_recent_was_deleted {
        Decision::PublishUpdate { replace: None }
    } else if version_changed {
        Decision::PublishUpdate {
            replace: history.prior_message_id,
        }
    } else if history.already_published {
        Decision::Suppress(SuppressReason::AlreadyPublished)
    } else {
        Decision::PublishNew
    }
}

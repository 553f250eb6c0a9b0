//! Announcement deduplication and debounce engine.
//!
//! Forum events flow through [`Announcer`]: freshly created threads are
//! announced once their tags settle, later tag changes and starter edits are
//! debounced per thread, and every run scans the announcement channel so that
//! a thread is never announced twice for the same versions.

mod coordinator;
mod decision;
mod engine;
mod history;

use std::fmt;

use tradbridge_core::AnnouncementKind;

use crate::channel::ChannelError;

pub use coordinator::{CreationGuard, PendingTicket, ThreadCoordinator};
pub use decision::{Decision, SuppressReason, decide};
pub use engine::{Announcer, AnnouncerConfig};
pub use history::{HistoryScan, scan};

/// Which gateway event started an announcement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Created,
    TagsUpdated,
    StarterEdited,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventSource::Created => "thread_create",
            EventSource::TagsUpdated => "thread_update",
            EventSource::StarterEdited => "message_edit",
        };
        f.write_str(label)
    }
}

/// How an announcement run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Published {
        kind: AnnouncementKind,
        message_id: u64,
    },
    Suppressed(SuppressReason),
    /// A newer event took over before this run could send.
    Cancelled,
    /// Thread or starter message could not be read.
    Skipped,
}

#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error("failed to send announcement for thread {thread_id}: {source}")]
    Send {
        thread_id: u64,
        source: ChannelError,
    },
}

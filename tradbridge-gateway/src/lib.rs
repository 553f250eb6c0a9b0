pub mod announce;
pub mod channel;
pub mod cron;
pub mod discord;
pub mod log_bridge;
pub mod reminder;
pub mod server;
pub mod state;
pub mod version_check;

pub use announce::{AnnounceError, Announcer, AnnouncerConfig, Outcome};
pub use channel::{ChannelError, ForumPosts, MessageChannel, ThreadSource};
pub use reminder::Reminder;
pub use state::{AppState, LogEntry};
pub use version_check::{CheckReport, VersionChecker};

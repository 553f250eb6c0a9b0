//! Domain types and pure logic shared by the tradbridge crates.

pub mod announcement;
pub mod config;
pub mod extract;
pub mod message;
pub mod metadata;
pub mod tags;
pub mod version;

// Config re-exports
pub use config::{
    AnnouncerSettings, Config, ConfigError, DiscordSettings, GatewaySettings, LoggingSettings,
    ReminderSettings, Secrets, SecretsError, Settings, SettingsError, VersionCheckSettings,
    load_dotenv,
};

pub use announcement::{Announcement, AnnouncementFormat, AnnouncementKind, PriorVersions};
pub use extract::{
    ExtractedInfo, MetadataPolicy, UNSPECIFIED, extract, extract_with, game_link, post_game_version,
    with_game_version,
};
pub use message::{Attachment, ChannelMessage, Embed, EmbedField, StarterMessage, ThreadSnapshot};
pub use metadata::{MetadataError, PostMetadata};
pub use tags::{Tag, TagEmoji, TagSet, has_update_tag};

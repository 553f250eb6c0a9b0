//! Settings configuration loaded from TOML files.
//!
//! Non-sensitive configuration lives in the XDG config directory
//! (`~/.config/tradbridge/config.toml`), or in `$TRADBRIDGE_CONFIG_DIR`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# tradbridge configuration file
# Located at: ~/.config/tradbridge/config.toml
#
# Bot tokens are loaded from environment variables:
#   - DISCORD_BOT_TOKEN       (announcer + publisher API)
#   - REMINDER_DISCORD_TOKEN  (F95 reminder bot)

[gateway]
host = "127.0.0.1"
port = 3000

[discord]
enabled = false
# forum_id = 0
# partner_forum_id = 0
# announce_channel_id = 0

[announcer]
delay_seconds = 5
jitter_ms = 0
settle_seconds = 2
recent_creation_seconds = 30
history_limit = 50
prefer_metadata = true

[reminder]
enabled = false
# semi_auto_forum_id = 0
# auto_forum_id = 0
# notification_channel_id = 0
days_before_publication = 14
settle_seconds = 5

[version_check]
enabled = false
schedule = "0 6 * * *"
# notification_channel_id = 0
checker_url = "https://f95zone.to/sam/checker.php"
chunk_size = 50
notified_retention_days = 30

[logging]
level = "info"
"#;

/// Settings loaded from TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// HTTP API server configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Forums and channels watched by the announcer bot
    #[serde(default)]
    pub discord: DiscordSettings,

    /// Announcement engine timings
    #[serde(default)]
    pub announcer: AnnouncerSettings,

    /// F95 reminder bot
    #[serde(default)]
    pub reminder: ReminderSettings,

    /// Scheduled version checker
    #[serde(default)]
    pub version_check: VersionCheckSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// HTTP API server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    /// Host to bind to
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

/// Discord settings shared by the announcer and the publisher API
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DiscordSettings {
    /// Whether the announcer bot is enabled
    #[serde(default)]
    pub enabled: bool,

    /// Main translation forum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum_id: Option<u64>,

    /// Optional partner forum, announced like the main one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_forum_id: Option<u64>,

    /// Channel receiving announcements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce_channel_id: Option<u64>,
}

impl DiscordSettings {
    /// Whether a forum is one of the watched forums.
    pub fn watches_forum(&self, forum_id: u64) -> bool {
        self.forum_id == Some(forum_id) || self.partner_forum_id == Some(forum_id)
    }
}

/// Announcement engine settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnnouncerSettings {
    /// Debounce delay before an update is announced
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,

    /// Upper bound of the random jitter added to the delay
    #[serde(default)]
    pub jitter_ms: u64,

    /// Wait after thread creation before trusting its tags
    #[serde(default = "default_announcer_settle_seconds")]
    pub settle_seconds: u64,

    /// Window after creation during which updates are ignored
    #[serde(default = "default_recent_creation_seconds")]
    pub recent_creation_seconds: u64,

    /// Number of channel messages scanned for a prior announcement
    #[serde(default = "default_history_limit")]
    pub history_limit: u8,

    /// Read structured metadata before free text
    #[serde(default = "default_true")]
    pub prefer_metadata: bool,
}

impl AnnouncerSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_seconds)
    }

    pub fn recent_creation_window(&self) -> Duration {
        Duration::from_secs(self.recent_creation_seconds)
    }
}

/// Reminder bot settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReminderSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semi_auto_forum_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_forum_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_channel_id: Option<u64>,

    /// Days between a thread change and its F95 publication date
    #[serde(default = "default_days_before_publication")]
    pub days_before_publication: i64,

    #[serde(default = "default_reminder_settle_seconds")]
    pub settle_seconds: u64,
}

impl ReminderSettings {
    pub fn watches_forum(&self, forum_id: u64) -> bool {
        self.semi_auto_forum_id == Some(forum_id) || self.auto_forum_id == Some(forum_id)
    }
}

/// Version checker settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionCheckSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Five-field cron expression, evaluated in UTC
    #[serde(default = "default_version_check_schedule")]
    pub schedule: String,

    /// Channel receiving version alerts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_channel_id: Option<u64>,

    #[serde(default = "default_checker_url")]
    pub checker_url: String,

    /// Thread ids per checker request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Days an alert stays in the anti-duplicate ledger
    #[serde(default = "default_notified_retention_days")]
    pub notified_retention_days: i64,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_delay_seconds() -> u64 {
    5
}

fn default_announcer_settle_seconds() -> u64 {
    2
}

fn default_recent_creation_seconds() -> u64 {
    30
}

fn default_history_limit() -> u8 {
    50
}

fn default_true() -> bool {
    true
}

fn default_days_before_publication() -> i64 {
    14
}

fn default_reminder_settle_seconds() -> u64 {
    5
}

fn default_version_check_schedule() -> String {
    "0 6 * * *".to_string()
}

fn default_checker_url() -> String {
    "https://f95zone.to/sam/checker.php".to_string()
}

fn default_chunk_size() -> usize {
    50
}

fn default_notified_retention_days() -> i64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

impl Default for AnnouncerSettings {
    fn default() -> Self {
        Self {
            delay_seconds: default_delay_seconds(),
            jitter_ms: 0,
            settle_seconds: default_announcer_settle_seconds(),
            recent_creation_seconds: default_recent_creation_seconds(),
            history_limit: default_history_limit(),
            prefer_metadata: true,
        }
    }
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            semi_auto_forum_id: None,
            auto_forum_id: None,
            notification_channel_id: None,
            days_before_publication: default_days_before_publication(),
            settle_seconds: default_reminder_settle_seconds(),
        }
    }
}

impl Default for VersionCheckSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            schedule: default_version_check_schedule(),
            notification_channel_id: None,
            checker_url: default_checker_url(),
            chunk_size: default_chunk_size(),
            notified_retention_days: default_notified_retention_days(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("TRADBRIDGE_CONFIG_DIR") {
            return Ok(PathBuf::from(override_dir).join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("tradbridge");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }

    /// Save settings to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secrets::tests::ENV_MUTEX;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.gateway.host, "127.0.0.1");
        assert_eq!(settings.gateway.port, 3000);
        assert!(!settings.discord.enabled);
        assert!(settings.discord.forum_id.is_none());
        assert_eq!(settings.announcer.delay_seconds, 5);
        assert_eq!(settings.announcer.jitter_ms, 0);
        assert_eq!(settings.announcer.settle_seconds, 2);
        assert_eq!(settings.announcer.recent_creation_seconds, 30);
        assert_eq!(settings.announcer.history_limit, 50);
        assert!(settings.announcer.prefer_metadata);
        assert_eq!(settings.reminder.days_before_publication, 14);
        assert_eq!(settings.version_check.schedule, "0 6 * * *");
        assert_eq!(settings.version_check.chunk_size, 50);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_default_file_parses_to_defaults() {
        let settings = Settings::from_toml(DEFAULT_CONFIG_TOML).unwrap();
        let defaults = Settings::default();
        assert_eq!(settings.discord.enabled, defaults.discord.enabled);
        assert_eq!(settings.reminder.enabled, defaults.reminder.enabled);
        assert_eq!(settings.version_check.enabled, defaults.version_check.enabled);
        assert_eq!(settings.announcer.delay_seconds, defaults.announcer.delay_seconds);
        assert_eq!(settings.version_check.checker_url, defaults.version_check.checker_url);
        assert_eq!(
            settings.reminder.settle_seconds,
            defaults.reminder.settle_seconds
        );
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
[gateway]
host = "0.0.0.0"
port = 8080

[discord]
enabled = false
forum_id = 100
partner_forum_id = 200
announce_channel_id = 300

[announcer]
delay_seconds = 3
jitter_ms = 1500
prefer_metadata = false

[reminder]
enabled = true
semi_auto_forum_id = 400
notification_channel_id = 500
days_before_publication = 7

[version_check]
enabled = true
schedule = "30 5 * * 1"
chunk_size = 20

[logging]
level = "debug"
"#;

        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
        assert!(settings.discord.watches_forum(100));
        assert!(settings.discord.watches_forum(200));
        assert!(!settings.discord.watches_forum(300));
        assert_eq!(settings.discord.announce_channel_id, Some(300));
        assert_eq!(settings.announcer.delay(), Duration::from_secs(3));
        assert_eq!(settings.announcer.jitter_ms, 1500);
        assert!(!settings.announcer.prefer_metadata);
        assert_eq!(settings.announcer.settle_seconds, 2);
        assert!(settings.reminder.watches_forum(400));
        assert!(!settings.reminder.watches_forum(100));
        assert_eq!(settings.reminder.days_before_publication, 7);
        assert_eq!(settings.version_check.schedule, "30 5 * * 1");
        assert_eq!(settings.version_check.chunk_size, 20);
        assert_eq!(settings.version_check.notified_retention_days, 30);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let mut settings = Settings::default();
        settings.discord.forum_id = Some(42);
        settings.gateway.port = 4000;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        settings.save_to_path(&path).expect("save failed");

        let content = fs::read_to_string(&path).expect("read failed");
        let loaded = Settings::from_toml(&content).expect("parse failed");
        assert_eq!(loaded.discord.forum_id, Some(42));
        assert_eq!(loaded.gateway.port, 4000);
    }

    #[test]
    fn test_load_creates_default_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        // SAFETY: guarded by ENV_MUTEX.
        unsafe { std::env::set_var("TRADBRIDGE_CONFIG_DIR", dir.path()) };

        let path = Settings::config_path().unwrap();
        let settings = Settings::load().unwrap();

        // SAFETY: guarded by ENV_MUTEX.
        unsafe { std::env::remove_var("TRADBRIDGE_CONFIG_DIR") };

        assert_eq!(path, dir.path().join("config.toml"));
        assert!(path.exists());
        assert_eq!(settings.announcer.history_limit, 50);
    }
}

//! Configuration management for tradbridge.
//!
//! Secrets (bot tokens) come from environment variables, settings from a
//! TOML file.
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `DISCORD_BOT_TOKEN` - announcer bot and publisher API
//! - `REMINDER_DISCORD_TOKEN` - F95 reminder bot
//!
//! ## Settings (TOML File)
//! Located at `~/.config/tradbridge/config.toml`:
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [discord]
//! enabled = true
//! forum_id = 1234
//! announce_channel_id = 5678
//!
//! [announcer]
//! delay_seconds = 5
//!
//! [logging]
//! level = "info"
//! ```

mod secrets;
mod settings;

pub use secrets::{Secrets, SecretsError};
pub use settings::{
    AnnouncerSettings, DiscordSettings, GatewaySettings, LoggingSettings, ReminderSettings,
    Settings, SettingsError, VersionCheckSettings,
};

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid version check schedule '{0}'")]
    InvalidSchedule(String),
}

impl Config {
    /// Load secrets from the environment and settings from TOML.
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;

        let schedule = settings.version_check.schedule.trim();
        if settings.version_check.enabled && schedule.split_whitespace().count() != 5 {
            return Err(ConfigError::InvalidSchedule(schedule.to_string()));
        }

        Ok(Self { secrets, settings })
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }

    /// Get the announcer bot token (if configured).
    pub fn discord_bot_token(&self) -> Option<&str> {
        self.secrets.discord_bot_token.as_deref()
    }

    /// Get the reminder bot token (if configured).
    pub fn reminder_bot_token(&self) -> Option<&str> {
        self.secrets.reminder_bot_token.as_deref()
    }

    /// Check if the announcer bot is enabled and has a token.
    pub fn discord_enabled(&self) -> bool {
        self.settings.discord.enabled && self.secrets.discord_bot_token.is_some()
    }

    /// Check if the reminder bot is enabled and has a token.
    pub fn reminder_enabled(&self) -> bool {
        self.settings.reminder.enabled && self.secrets.reminder_bot_token.is_some()
    }
}

/// Load .env file if it exists (for development convenience).
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

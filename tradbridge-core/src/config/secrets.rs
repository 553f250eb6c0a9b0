//! Secrets configuration loaded from environment variables only.
//!
//! Bot tokens are never stored in the TOML settings file.

use std::env;

/// Secrets loaded exclusively from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Announcer / publisher bot token (env: DISCORD_BOT_TOKEN)
    pub discord_bot_token: Option<String>,

    /// Reminder bot token (env: REMINDER_DISCORD_TOKEN)
    pub reminder_bot_token: Option<String>,
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Secret {0} is set but empty")]
    EmptySecret(&'static str),
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// This also loads a .env file if present (for development).
    pub fn from_env() -> Result<Self, SecretsError> {
        let _ = dotenvy::dotenv();

        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        Ok(Self {
            discord_bot_token: read_token("DISCORD_BOT_TOKEN")?,
            reminder_bot_token: read_token("REMINDER_DISCORD_TOKEN")?,
        })
    }
}

fn read_token(name: &'static str) -> Result<Option<String>, SecretsError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(SecretsError::EmptySecret(name)),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that modify environment variables must not run concurrently
    pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());

    pub(crate) fn clear_env() {
        // SAFETY: callers hold ENV_MUTEX.
        unsafe {
            env::remove_var("DISCORD_BOT_TOKEN");
            env::remove_var("REMINDER_DISCORD_TOKEN");
        }
    }

    #[test]
    fn test_no_tokens_is_not_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let secrets = Secrets::from_env_inner().unwrap();
        assert!(secrets.discord_bot_token.is_none());
        assert!(secrets.reminder_bot_token.is_none());
    }

    #[test]
    fn test_load_both_tokens() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        // SAFETY: guarded by ENV_MUTEX.
        unsafe {
            env::set_var("DISCORD_BOT_TOKEN", " main-token ");
            env::set_var("REMINDER_DISCORD_TOKEN", "reminder-token");
        }

        let secrets = Secrets::from_env_inner().unwrap();
        assert_eq!(secrets.discord_bot_token.as_deref(), Some("main-token"));
        assert_eq!(secrets.reminder_bot_token.as_deref(), Some("reminder-token"));
        clear_env();
    }

    #[test]
    fn test_empty_token_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        // SAFETY: guarded by ENV_MUTEX.
        unsafe { env::set_var("REMINDER_DISCORD_TOKEN", "   ") }

        let result = Secrets::from_env_inner();
        assert!(matches!(
            result.unwrap_err(),
            SecretsError::EmptySecret("REMINDER_DISCORD_TOKEN")
        ));
        clear_env();
    }
}

//! Server Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::db::AccountId;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Event listener bind address (e.g., "127.0.0.1:8080")
    pub bind_address: String,

    /// `SQLite` connection URL
    pub database_url: String,

    /// Group whose members get allow-list access
    pub game_group_id: i64,

    /// Group for administrators (optional)
    pub admin_group_id: Option<i64>,

    /// Game server remote console address (host:port)
    pub rcon_address: String,

    /// Game server remote console password
    pub rcon_password: String,

    /// Identity lookup API base URL
    pub resolver_api_url: String,

    /// User-Agent sent to the identity lookup API
    pub resolver_user_agent: String,

    /// Upper bound for every external call (default: 10s)
    pub external_timeout: Duration,

    /// Prefix that marks a chat message as a command (default: "!")
    pub command_prefix: String,

    /// The bot's own chat account; enables "@bot command" addressing (optional)
    pub bot_account_id: Option<AccountId>,

    /// OneBot HTTP API for outbound group messages (optional)
    pub onebot_api_url: Option<String>,

    /// OneBot access token (optional)
    pub onebot_access_token: Option<String>,

    /// TOML file with custom console commands (optional)
    pub custom_commands_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8080".into()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data.db?mode=rwc".into()),
            game_group_id: env::var("GAME_GROUP_ID")
                .context("GAME_GROUP_ID must be set")?
                .parse()
                .context("GAME_GROUP_ID must be a number")?,
            admin_group_id: env::var("ADMIN_GROUP_ID")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("ADMIN_GROUP_ID must be a number")?,
            rcon_address: env::var("RCON_ADDRESS").context("RCON_ADDRESS must be set")?,
            rcon_password: env::var("RCON_PASSWORD").context("RCON_PASSWORD must be set")?,
            resolver_api_url: env::var("RESOLVER_API_URL")
                .unwrap_or_else(|_| "https://api.mojang.com".into()),
            resolver_user_agent: env::var("RESOLVER_USER_AGENT")
                .unwrap_or_else(|_| concat!("wl-bridge/", env!("CARGO_PKG_VERSION")).into()),
            external_timeout: external_timeout()?,
            command_prefix: env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".into()),
            bot_account_id: env::var("BOT_ACCOUNT_ID")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("BOT_ACCOUNT_ID must be a number")?,
            onebot_api_url: env::var("ONEBOT_API_URL").ok(),
            onebot_access_token: env::var("ONEBOT_ACCESS_TOKEN").ok(),
            custom_commands_file: env::var("CUSTOM_COMMANDS_FILE").ok().map(PathBuf::from),
        })
    }

    /// Check if outbound group messages are configured.
    #[must_use]
    pub const fn has_onebot_api(&self) -> bool {
        self.onebot_api_url.is_some()
    }

    /// Whether messages from `group_id` are handled at all.
    #[must_use]
    pub fn is_served_group(&self, group_id: i64) -> bool {
        group_id == self.game_group_id || self.admin_group_id == Some(group_id)
    }

    /// Create a default configuration for testing.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            database_url: "sqlite::memory:".into(),
            game_group_id: 1000,
            admin_group_id: Some(2000),
            rcon_address: "127.0.0.1:25575".into(),
            rcon_password: "test".into(),
            resolver_api_url: "http://127.0.0.1:9".into(),
            resolver_user_agent: "wl-bridge-test".into(),
            external_timeout: Duration::from_secs(2),
            command_prefix: "!".into(),
            bot_account_id: Some(99),
            onebot_api_url: None,
            onebot_access_token: None,
            custom_commands_file: None,
        }
    }
}

/// Bound on every external call, in whole seconds. Zero is rejected.
fn external_timeout() -> Result<Duration> {
    let Ok(raw) = env::var("EXTERNAL_TIMEOUT_SECS") else {
        return Ok(Duration::from_secs(10));
    };
    let secs: u64 = raw
        .parse()
        .context("EXTERNAL_TIMEOUT_SECS must be a whole number of seconds")?;
    anyhow::ensure!(secs > 0, "EXTERNAL_TIMEOUT_SECS must be greater than zero");
    Ok(Duration::from_secs(secs))
}

use std::env;
use std::sync::Arc;
use std::time::Duration;

use serenity::prelude::TypeMapKey;
use tracing::info;

pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_VOLUME: u8 = 100;

/// Process configuration, read once from the environment at startup.
/// `DISCORD_TOKEN` is read separately in `main` since nothing else needs it.
pub struct BotConfig {
    pub prefix: String,
    pub database_url: String,
    pub sandbox_url: String,
    pub sandbox_token: Option<String>,
    pub idle_timeout: Duration,
}

pub struct ConfigKey;

impl TypeMapKey for ConfigKey {
    type Value = Arc<BotConfig>;
}

impl BotConfig {
    pub fn from_env() -> Self {
        let prefix = env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string());
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://maestro.db?mode=rwc".to_string());
        let sandbox_url = env::var("SANDBOX_URL")
            .unwrap_or_else(|_| "https://emkc.org/api/v2/piston/execute".to_string());
        let sandbox_token = env::var("SANDBOX_TOKEN").ok();
        let idle_timeout = env::var("IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);

        info!("Using command prefix '{prefix}', idle timeout {idle_timeout}s");

        Self {
            prefix,
            database_url,
            sandbox_url,
            sandbox_token,
            idle_timeout: Duration::from_secs(idle_timeout),
        }
    }
}

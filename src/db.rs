use std::sync::Arc;

use serenity::model::id::{ChannelId, GuildId, RoleId};
use serenity::prelude::TypeMapKey;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::{DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_VOLUME};
use crate::error::BotResult;

/// One settings row per guild. Every column has a default so rows can be
/// created lazily by whichever setter runs first; later setters only touch
/// their own column.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GuildSettings {
    pub guild_id: i64,
    pub default_volume: i64,
    pub idle_timeout_secs: i64,
    pub dj_role: Option<i64>,
    pub log_channel: Option<i64>,
}

impl GuildSettings {
    pub fn defaults(guild_id: GuildId) -> Self {
        Self {
            guild_id: guild_id.0 as i64,
            default_volume: DEFAULT_VOLUME as i64,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS as i64,
            dj_role: None,
            log_channel: None,
        }
    }

    pub fn dj_role_id(&self) -> Option<RoleId> {
        self.dj_role.map(|raw| RoleId(raw as u64))
    }

    pub fn log_channel_id(&self) -> Option<ChannelId> {
        self.log_channel.map(|raw| ChannelId(raw as u64))
    }
}

pub struct Database {
    pool: SqlitePool,
}

pub struct DatabaseKey;

impl TypeMapKey for DatabaseKey {
    type Value = Arc<Database>;
}

impl Database {
    pub async fn connect(url: &str) -> BotResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id INTEGER PRIMARY KEY,
                default_volume INTEGER NOT NULL DEFAULT 100,
                idle_timeout_secs INTEGER NOT NULL DEFAULT 300,
                dj_role INTEGER,
                log_channel INTEGER
            )",
        )
        .execute(&pool)
        .await?;

        info!("Guild settings store ready");

        Ok(Self { pool })
    }

    pub async fn guild_settings(&self, guild_id: GuildId) -> BotResult<Option<GuildSettings>> {
        let row = sqlx::query_as::<_, GuildSettings>(
            "SELECT guild_id, default_volume, idle_timeout_secs, dj_role, log_channel
             FROM guild_settings WHERE guild_id = ?",
        )
        .bind(guild_id.0 as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn set_default_volume(&self, guild_id: GuildId, volume: u8) -> BotResult<()> {
        sqlx::query(
            "INSERT INTO guild_settings (guild_id, default_volume) VALUES (?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET default_volume = excluded.default_volume",
        )
        .bind(guild_id.0 as i64)
        .bind(volume as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_idle_timeout(&self, guild_id: GuildId, seconds: u32) -> BotResult<()> {
        sqlx::query(
            "INSERT INTO guild_settings (guild_id, idle_timeout_secs) VALUES (?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET idle_timeout_secs = excluded.idle_timeout_secs",
        )
        .bind(guild_id.0 as i64)
        .bind(seconds as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_dj_role(&self, guild_id: GuildId, role: Option<RoleId>) -> BotResult<()> {
        sqlx::query(
            "INSERT INTO guild_settings (guild_id, dj_role) VALUES (?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET dj_role = excluded.dj_role",
        )
        .bind(guild_id.0 as i64)
        .bind(role.map(|r| r.0 as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_log_channel(&self, guild_id: GuildId, channel: Option<ChannelId>) -> BotResult<()> {
        sqlx::query(
            "INSERT INTO guild_settings (guild_id, log_channel) VALUES (?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET log_channel = excluded.log_channel",
        )
        .bind(guild_id.0 as i64)
        .bind(channel.map(|c| c.0 as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        Database::connect("sqlite::memory:")
            .await
            .expect("in-memory database")
    }

    #[tokio::test]
    async fn missing_guild_has_no_row() {
        let db = memory_db().await;

        let row = db.guild_settings(GuildId(1)).await.expect("query");
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn upsert_keeps_unrelated_columns() {
        let db = memory_db().await;
        let guild = GuildId(42);

        db.set_default_volume(guild, 55).await.expect("set volume");
        db.set_dj_role(guild, Some(RoleId(7))).await.expect("set role");

        let row = db
            .guild_settings(guild)
            .await
            .expect("query")
            .expect("row exists");
        assert_eq!(row.default_volume, 55);
        assert_eq!(row.dj_role_id(), Some(RoleId(7)));
        assert_eq!(row.idle_timeout_secs, DEFAULT_IDLE_TIMEOUT_SECS as i64);

        db.set_dj_role(guild, None).await.expect("clear role");
        let row = db
            .guild_settings(guild)
            .await
            .expect("query")
            .expect("row exists");
        assert_eq!(row.dj_role, None);
        assert_eq!(row.default_volume, 55);
    }
}

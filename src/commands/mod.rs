//! Command handlers, grouped by concern.

/// General purpose commands (ping, help).
pub mod general;
/// Music playback: queueing, voting, the DJ, the control message.
pub mod music;
/// Remote code execution through the sandbox API.
pub mod runcode;
/// Per-guild settings persisted in the store.
pub mod settings;

use std::sync::Arc;

use serenity::client::Context;
use serenity::framework::standard::CommandError;
use serenity::model::channel::{Channel, Message};
use serenity::model::guild::Guild;
use serenity::model::id::GuildId;
use serenity::Result as SerenityResult;
use tracing::info;

use crate::config::{BotConfig, ConfigKey};
use crate::db::{Database, DatabaseKey};
use crate::exec::{ExecTracker, ExecTrackerKey, SandboxClient, SandboxKey};

/// Checks that a message successfully sent; if not, then logs why.
pub fn check_msg(result: SerenityResult<Message>) {
    if let Err(why) = result {
        info!("Error sending message: {why:?}");
    }
}

pub fn get_guild(ctx: &Context, msg: &Message) -> Result<Guild, CommandError> {
    msg.guild(&ctx.cache)
        .ok_or_else(|| CommandError::from("Guild not found"))
}

pub fn get_guild_id(ctx: &Context, msg: &Message) -> Result<GuildId, CommandError> {
    Ok(get_guild(ctx, msg)?.id)
}

pub async fn database(ctx: &Context) -> Arc<Database> {
    ctx.data
        .read()
        .await
        .get::<DatabaseKey>()
        .cloned()
        .expect("Database placed in at initialisation.")
}

pub async fn bot_config(ctx: &Context) -> Arc<BotConfig> {
    ctx.data
        .read()
        .await
        .get::<ConfigKey>()
        .cloned()
        .expect("Config placed in at initialisation.")
}

pub async fn sandbox(ctx: &Context) -> Arc<SandboxClient> {
    ctx.data
        .read()
        .await
        .get::<SandboxKey>()
        .cloned()
        .expect("Sandbox client placed in at initialisation.")
}

pub async fn exec_tracker(ctx: &Context) -> Arc<ExecTracker> {
    ctx.data
        .read()
        .await
        .get::<ExecTrackerKey>()
        .cloned()
        .expect("Exec tracker placed in at initialisation.")
}

/// Elevated moderation permission, resolved against the channel the command
/// came from. Falls back to an HTTP member fetch when the cache is cold.
pub async fn has_manage_guild(ctx: &Context, guild: &Guild, msg: &Message) -> bool {
    let member = match guild.members.get(&msg.author.id).cloned() {
        Some(member) => member,
        None => match guild.member(ctx, msg.author.id).await {
            Ok(member) => member,
            Err(_) => return false,
        },
    };

    let channel = match guild.channels.get(&msg.channel_id) {
        Some(Channel::Guild(channel)) => channel.clone(),
        _ => return false,
    };

    guild
        .user_permissions_in(&channel, &member)
        .map(|permissions| permissions.manage_guild())
        .unwrap_or(false)
}

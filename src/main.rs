use std::env;
use std::sync::Arc;

use dotenvy::dotenv;
use serenity::{
    async_trait,
    client::{Client, Context, EventHandler},
    framework::{
        standard::{macros::hook, CommandResult},
        StandardFramework,
    },
    model::{
        channel::Message,
        event::MessageUpdateEvent,
        gateway::{Activity, Ready},
        id::{ChannelId, GuildId, MessageId},
        voice::VoiceState,
    },
    prelude::GatewayIntents,
    utils::Colour,
};
use songbird::SerenityInit;
use tracing::{error, info};

use crate::commands::general::GENERAL_GROUP;
use crate::commands::music::MUSIC_GROUP;
use crate::commands::runcode::EXEC_GROUP;
use crate::commands::settings::SETTINGS_GROUP;
use crate::config::{BotConfig, ConfigKey};
use crate::db::{Database, DatabaseKey};
use crate::exec::{ExecTracker, ExecTrackerKey, SandboxClient, SandboxKey};
use crate::player::{PlayerKey, SessionRegistry};

mod commands;
mod config;
mod db;
mod error;
mod exec;
mod player;

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);

        let prefix = { commands::bot_config(&ctx).await.prefix.clone() };
        ctx.set_activity(Activity::listening(format!("{prefix}help"))).await;
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        player::playback::handle_voice_state_update(&ctx, old.as_ref(), &new).await;
    }

    async fn message_update(
        &self,
        ctx: Context,
        _old_if_available: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        rerun_edited_invocation(&ctx, new, event).await;
    }

    async fn message_delete(
        &self,
        ctx: Context,
        _channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        let tracker = commands::exec_tracker(&ctx).await;
        if let Some((channel, reply)) = tracker.reply_for(deleted_message_id) {
            let _ = channel.delete_message(&ctx.http, reply).await;
            tracker.forget(deleted_message_id);
        }
    }
}

/// An edited `run` invocation reruns into the existing reply instead of
/// posting a new one. A reply that was deleted in the meantime just falls
/// out of tracking.
async fn rerun_edited_invocation(ctx: &Context, new: Option<Message>, event: MessageUpdateEvent) {
    let tracker = commands::exec_tracker(ctx).await;
    let (channel, reply_id) = match tracker.reply_for(event.id) {
        Some(tracked) => tracked,
        None => return,
    };

    let content = match new.map(|message| message.content).or(event.content) {
        Some(content) => content,
        None => return,
    };

    let config = commands::bot_config(ctx).await;
    let input = match exec::strip_invocation(&content, &config.prefix) {
        Some(input) => input.to_string(),
        None => return,
    };

    let sandbox = commands::sandbox(ctx).await;
    let reply = exec::build_reply(&sandbox, &input).await;

    if let Err(why) = channel
        .edit_message(&ctx.http, reply_id, |m| m.content(reply))
        .await
    {
        info!("Dropping tracked run reply: {why:?}");
        tracker.forget(event.id);
    }
}

#[hook]
async fn after(ctx: &Context, msg: &Message, command_name: &str, result: CommandResult) {
    let why = match result {
        Ok(()) => return,
        Err(why) => why,
    };

    error!("Command '{command_name}' failed: {why:?}");

    let sent = msg
        .channel_id
        .send_message(&ctx.http, |m| {
            m.embed(|e| {
                e.colour(Colour::RED);
                e.title("Something went wrong");
                e.description(format!(
                    "`{command_name}` hit an unexpected error. It has been logged; try again later."
                ))
            })
        })
        .await;
    if let Err(why) = sent {
        info!("Error sending message: {why:?}");
    }

    if let Some(guild_id) = msg.guild_id {
        if let Ok(Some(settings)) = commands::database(ctx).await.guild_settings(guild_id).await {
            if let Some(log_channel) = settings.log_channel_id() {
                let _ = log_channel
                    .say(&ctx.http, format!("Command `{command_name}` failed: {why}"))
                    .await;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt::init();

    let token = env::var("DISCORD_TOKEN").expect("Expected a token in the environment");
    let config = Arc::new(BotConfig::from_env());

    let database = Database::connect(&config.database_url)
        .await
        .expect("Failed opening the settings database");

    let framework = StandardFramework::new()
        .configure(|c| c.prefix(&config.prefix))
        .after(after)
        .group(&GENERAL_GROUP)
        .group(&MUSIC_GROUP)
        .group(&EXEC_GROUP)
        .group(&SETTINGS_GROUP);

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(Handler)
        .framework(framework)
        .register_songbird()
        .await
        .expect("Err creating client");

    {
        let mut data = client.data.write().await;

        data.insert::<ConfigKey>(Arc::clone(&config));
        data.insert::<DatabaseKey>(Arc::new(database));
        data.insert::<PlayerKey>(Arc::new(SessionRegistry::new()));
        data.insert::<SandboxKey>(Arc::new(SandboxClient::new(
            config.sandbox_url.clone(),
            config.sandbox_token.clone(),
        )));
        data.insert::<ExecTrackerKey>(Arc::new(ExecTracker::new()));
    }

    tokio::spawn(async move {
        let _ = client.start().await.map_err(|why| info!("Client ended: {why:?}"));
    });

    tokio::signal::ctrl_c().await.expect("Control-C interruption failed!");

    info!("Received Ctrl-C, shutting down.");
}

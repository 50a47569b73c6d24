use std::cmp::min;
use std::sync::Arc;
use std::time::Duration;

use serenity::client::Context;
use serenity::framework::standard::macros::{command, group};
use serenity::framework::standard::{Args, CommandError, CommandResult};
use serenity::model::channel::Message;
use serenity::model::channel::ReactionType::Unicode;
use serenity::model::guild::Guild;
use serenity::model::id::{ChannelId, UserId};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{bot_config, check_msg, database, get_guild, get_guild_id, has_manage_guild};
use crate::config::DEFAULT_VOLUME;
use crate::player::track::{format_duration, resolve_request};
use crate::player::{self, controller, playback, required_votes, Session, VoteAction};

#[group]
#[commands(
    join, leave, play, pause, resume, skip, stop, shuffle, clear, queue, nowplaying, volume, seek,
    dj
)]
pub struct Music;

enum JoinOutcome {
    Joined(Arc<Mutex<Session>>),
    AlreadyConnected(Arc<Mutex<Session>>),
    NoChannel,
}

/// Connects the bot and creates the guild session if there is none yet.
/// Already-connected guilds are a no-op; a caller with no resolvable voice
/// channel is a reported outcome, not an error.
async fn ensure_session(
    ctx: &Context,
    msg: &Message,
    explicit: Option<ChannelId>,
) -> Result<JoinOutcome, CommandError> {
    let guild = get_guild(ctx, msg)?;
    let registry = player::registry(ctx).await;

    if let Some(session) = registry.get(guild.id) {
        return Ok(JoinOutcome::AlreadyConnected(session));
    }

    let target = explicit.or_else(|| {
        guild
            .voice_states
            .get(&msg.author.id)
            .and_then(|state| state.channel_id)
    });
    let target = match target {
        Some(channel) => channel,
        None => return Ok(JoinOutcome::NoChannel),
    };

    let manager = songbird::get(ctx)
        .await
        .expect("Songbird Voice client placed in at initialisation.")
        .clone();

    let (call, joined) = manager.join(guild.id, target).await;
    joined?;

    {
        let mut call = call.lock().await;
        if !call.is_deaf() {
            if let Err(why) = call.deafen(true).await {
                info!("Deafen failed due to {why:?}");
            }
        }
    }

    let config = bot_config(ctx).await;
    let (volume, idle_timeout) = match database(ctx).await.guild_settings(guild.id).await {
        Ok(Some(row)) => (
            row.default_volume.clamp(1, 100) as u8,
            Duration::from_secs(row.idle_timeout_secs.max(0) as u64),
        ),
        Ok(None) => (DEFAULT_VOLUME, config.idle_timeout),
        Err(why) => {
            warn!("Settings lookup failed, using defaults: {why}");
            (DEFAULT_VOLUME, config.idle_timeout)
        }
    };

    info!("Connected to voice channel {} on guild {}", target.0, guild.id.0);

    let session = Session::new(
        msg.channel_id,
        target,
        Some(msg.author.id),
        volume,
        idle_timeout,
    );

    Ok(JoinOutcome::Joined(registry.insert(guild.id, session)))
}

#[command]
#[aliases("connect", "summon")]
#[only_in(guilds)]
async fn join(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let explicit = args.single::<u64>().ok().map(ChannelId);

    match ensure_session(ctx, msg, explicit).await? {
        JoinOutcome::Joined(_) => {
            check_msg(msg.channel_id.say(&ctx.http, "Joined; you have the decks.").await)
        }
        JoinOutcome::AlreadyConnected(_) => {
            check_msg(msg.reply(ctx, "Already connected here.").await)
        }
        JoinOutcome::NoChannel => check_msg(
            msg.reply(ctx, "Join a voice channel first, or give me one to join.")
                .await,
        ),
    }

    Ok(())
}

#[command]
#[aliases("disconnect", "dc")]
#[only_in(guilds)]
async fn leave(ctx: &Context, msg: &Message) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    let registry = player::registry(ctx).await;

    let session = match registry.get(guild.id) {
        Some(session) => session,
        None => {
            check_msg(msg.reply(ctx, "Not in a voice channel.").await);
            return Ok(());
        }
    };

    let dj = { session.lock().await.dj };
    if !is_privileged(ctx, &guild, msg, dj).await {
        check_msg(
            msg.reply(ctx, "Only the DJ or a moderator can disconnect me; try voting with `stop`.")
                .await,
        );
        return Ok(());
    }

    playback::teardown(ctx, guild.id).await;
    check_msg(msg.channel_id.say(&ctx.http, "Left the voice channel.").await);

    Ok(())
}

#[command]
#[aliases("p")]
#[only_in(guilds)]
async fn play(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let query = args.message().trim().to_string();
    if query.is_empty() {
        check_msg(msg.reply(ctx, "Give me a URL or something to search for.").await);
        return Ok(());
    }

    let session = match ensure_session(ctx, msg, None).await? {
        JoinOutcome::Joined(session) | JoinOutcome::AlreadyConnected(session) => session,
        JoinOutcome::NoChannel => {
            check_msg(msg.reply(ctx, "Join a voice channel first.").await);
            return Ok(());
        }
    };

    let loading = Unicode("\u{23f3}".to_string());
    let _ = msg.react(&ctx.http, loading.clone()).await;

    let tracks = resolve_request(&query, msg.author.id).await?;

    let bot_id = ctx.cache.current_user_id();
    let _ = msg
        .channel_id
        .delete_reaction(&ctx.http, msg.id, Some(bot_id), loading)
        .await;

    if tracks.is_empty() {
        let cleaned = query.replace('`', "");
        check_msg(msg.reply(ctx, format!("I found nothing for `{cleaned}`.")).await);
        return Ok(());
    }

    let count = tracks.len();
    let first_title = tracks[0].title.clone();
    let guild_id = get_guild_id(ctx, msg)?;

    let should_advance = { session.lock().await.enqueue(tracks) };

    let note = if count == 1 {
        format!("Queued **{first_title}**.")
    } else {
        format!("Queued {count} tracks.")
    };
    check_msg(msg.channel_id.say(&ctx.http, note).await);

    if should_advance {
        playback::advance(ctx, guild_id).await;
    } else {
        controller::refresh(ctx, &session).await;
    }

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn pause(ctx: &Context, msg: &Message) -> CommandResult {
    vote_gated(ctx, msg, VoteAction::Pause).await
}

#[command]
#[aliases("unpause")]
#[only_in(guilds)]
async fn resume(ctx: &Context, msg: &Message) -> CommandResult {
    vote_gated(ctx, msg, VoteAction::Resume).await
}

#[command]
#[aliases("next")]
#[only_in(guilds)]
async fn skip(ctx: &Context, msg: &Message) -> CommandResult {
    vote_gated(ctx, msg, VoteAction::Skip).await
}

#[command]
#[only_in(guilds)]
async fn stop(ctx: &Context, msg: &Message) -> CommandResult {
    vote_gated(ctx, msg, VoteAction::Stop).await
}

#[command]
#[only_in(guilds)]
async fn shuffle(ctx: &Context, msg: &Message) -> CommandResult {
    vote_gated(ctx, msg, VoteAction::Shuffle).await
}

#[command]
#[only_in(guilds)]
async fn clear(ctx: &Context, msg: &Message) -> CommandResult {
    vote_gated(ctx, msg, VoteAction::Clear).await
}

/// The shared privileged-or-vote path behind every disruptive action.
async fn vote_gated(ctx: &Context, msg: &Message, action: VoteAction) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    let registry = player::registry(ctx).await;

    let session = match registry.get(guild.id) {
        Some(session) => session,
        None => {
            check_msg(msg.reply(ctx, "Nothing is playing in this guild.").await);
            return Ok(());
        }
    };

    if matches!(
        action,
        VoteAction::Pause | VoteAction::Resume | VoteAction::Skip
    ) {
        let idle = { !session.lock().await.is_playing() };
        if idle {
            check_msg(msg.reply(ctx, "There is no track playing right now.").await);
            return Ok(());
        }
    }

    let (voice_channel, dj, requester) = {
        let locked = session.lock().await;
        (
            locked.voice_channel,
            locked.dj,
            locked.current.as_ref().map(|track| track.requested_by),
        )
    };

    let in_channel = guild
        .voice_states
        .get(&msg.author.id)
        .and_then(|state| state.channel_id)
        == Some(voice_channel);
    if !in_channel {
        check_msg(
            msg.reply(ctx, "You need to be in the voice channel to do that.")
                .await,
        );
        return Ok(());
    }

    let privileged = is_privileged(ctx, &guild, msg, dj).await;
    let own_track = action == VoteAction::Skip && requester == Some(msg.author.id);

    if privileged || own_track {
        {
            session.lock().await.votes.clear(action);
        }
        playback::execute_action(ctx, guild.id, action).await?;
        check_msg(
            msg.channel_id
                .say(&ctx.http, format!("Okay, I will {}.", action.verb()))
                .await,
        );
        return Ok(());
    }

    let bot_id = ctx.cache.current_user_id();
    let listeners = player::channel_listeners(&guild, voice_channel, bot_id).len();
    let needed = required_votes(action, listeners);

    let have = { session.lock().await.votes.cast(action, msg.author.id) };

    if have >= needed {
        {
            session.lock().await.votes.clear(action);
        }
        playback::execute_action(ctx, guild.id, action).await?;
        check_msg(
            msg.channel_id
                .say(&ctx.http, format!("Vote passed, about to {}.", action.verb()))
                .await,
        );
    } else {
        check_msg(
            msg.channel_id
                .say(
                    &ctx.http,
                    format!("Vote to {} registered ({have}/{needed}).", action.verb()),
                )
                .await,
        );
    }

    Ok(())
}

async fn is_privileged(ctx: &Context, guild: &Guild, msg: &Message, dj: Option<UserId>) -> bool {
    if dj == Some(msg.author.id) {
        return true;
    }

    // A configured DJ role carries the same weight as the session DJ.
    if let Ok(Some(settings)) = database(ctx).await.guild_settings(guild.id).await {
        if let Some(role) = settings.dj_role_id() {
            if let Some(member) = &msg.member {
                if member.roles.contains(&role) {
                    return true;
                }
            }
        }
    }

    has_manage_guild(ctx, guild, msg).await
}

#[command]
#[aliases("q")]
#[only_in(guilds)]
async fn queue(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;
    let registry = player::registry(ctx).await;

    let listing = match registry.get(guild_id) {
        Some(session) => {
            let locked = session.lock().await;
            if locked.queue.is_empty() {
                None
            } else {
                let max_tracks = 20;
                let mut lines = Vec::with_capacity(min(locked.queue.len(), max_tracks));
                for (index, track) in locked.queue.iter().take(max_tracks).enumerate() {
                    lines.push(format!("{} - {}", index + 1, track.title));
                }
                Some((lines.join("\n"), locked.queue.len()))
            }
        }
        None => None,
    };

    match listing {
        Some((lines, total)) => check_msg(
            msg.channel_id
                .say(&ctx.http, format!("**Queue** ({total} tracks):\n```{lines}```"))
                .await,
        ),
        None => check_msg(msg.channel_id.say(&ctx.http, "The queue is empty!").await),
    }

    Ok(())
}

#[command]
#[aliases("np")]
#[only_in(guilds)]
async fn nowplaying(ctx: &Context, msg: &Message) -> CommandResult {
    let guild_id = get_guild_id(ctx, msg)?;
    let registry = player::registry(ctx).await;

    match registry.get(guild_id) {
        Some(session) => controller::refresh(ctx, &session).await,
        None => check_msg(msg.reply(ctx, "Nothing is playing in this guild.").await),
    }

    Ok(())
}

#[command]
#[aliases("vol")]
#[only_in(guilds)]
async fn volume(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    let registry = player::registry(ctx).await;

    let session = match registry.get(guild.id) {
        Some(session) => session,
        None => {
            check_msg(msg.reply(ctx, "Nothing is playing in this guild.").await);
            return Ok(());
        }
    };

    let level = match args.single::<i64>() {
        Ok(level) if (1..=100).contains(&level) => level as u8,
        Ok(level) => {
            check_msg(
                msg.reply(ctx, format!("Volume must be between 1 and 100, not {level}."))
                    .await,
            );
            return Ok(());
        }
        Err(_) => {
            let current = { session.lock().await.volume };
            check_msg(msg.reply(ctx, format!("Volume is at {current}%.")).await);
            return Ok(());
        }
    };

    let dj = { session.lock().await.dj };
    if !is_privileged(ctx, &guild, msg, dj).await {
        check_msg(
            msg.reply(ctx, "Only the DJ or a moderator can change the volume.")
                .await,
        );
        return Ok(());
    }

    {
        let mut locked = session.lock().await;
        locked.volume = level;
        if let Some(handle) = &locked.handle {
            let _ = handle.set_volume(level as f32 / 100.0);
        }
    }
    controller::refresh(ctx, &session).await;
    check_msg(msg.channel_id.say(&ctx.http, format!("Volume set to {level}%.")).await);

    Ok(())
}

#[command]
#[only_in(guilds)]
async fn seek(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    let registry = player::registry(ctx).await;

    let session = match registry.get(guild.id) {
        Some(session) => session,
        None => {
            check_msg(msg.reply(ctx, "Nothing is playing in this guild.").await);
            return Ok(());
        }
    };

    let seconds = match args.single::<u64>() {
        Ok(seconds) => seconds,
        Err(_) => {
            check_msg(msg.reply(ctx, "Give me a position in seconds.").await);
            return Ok(());
        }
    };

    let dj = { session.lock().await.dj };
    if !is_privileged(ctx, &guild, msg, dj).await {
        check_msg(msg.reply(ctx, "Only the DJ or a moderator can seek.").await);
        return Ok(());
    }

    let handle = { session.lock().await.handle.clone() };
    match handle {
        Some(handle) => {
            handle.seek_time(Duration::from_secs(seconds))?;
            let position = format_duration(Duration::from_secs(seconds));
            check_msg(msg.channel_id.say(&ctx.http, format!("Jumped to {position}.")).await);
        }
        None => check_msg(msg.reply(ctx, "There is no track playing right now.").await),
    }

    Ok(())
}

#[command]
#[aliases("swapdj")]
#[only_in(guilds)]
async fn dj(ctx: &Context, msg: &Message) -> CommandResult {
    let guild = get_guild(ctx, msg)?;
    let registry = player::registry(ctx).await;

    let session = match registry.get(guild.id) {
        Some(session) => session,
        None => {
            check_msg(msg.reply(ctx, "Nothing is playing in this guild.").await);
            return Ok(());
        }
    };

    let voice_channel = { session.lock().await.voice_channel };
    let bot_id = ctx.cache.current_user_id();
    let listeners = player::channel_listeners(&guild, voice_channel, bot_id);

    if listeners.len() < 3 {
        check_msg(
            msg.reply(ctx, "I need at least 3 people in the channel to reassign the DJ.")
                .await,
        );
        return Ok(());
    }

    let current = { session.lock().await.dj };
    let candidate = msg.mentions.iter().find(|user| !user.bot).map(|user| user.id);

    let new_dj = match candidate {
        Some(user_id) => {
            if !listeners.contains(&user_id) {
                check_msg(msg.reply(ctx, "That member is not in the voice channel.").await);
                return Ok(());
            }
            if current == Some(user_id) {
                check_msg(msg.reply(ctx, "They are the DJ already.").await);
                return Ok(());
            }
            user_id
        }
        None => match listeners.iter().copied().find(|id| Some(*id) != current) {
            Some(user_id) => user_id,
            None => {
                check_msg(msg.reply(ctx, "There is nobody to hand the decks to.").await);
                return Ok(());
            }
        },
    };

    {
        session.lock().await.dj = Some(new_dj);
    }
    check_msg(
        msg.channel_id
            .say(&ctx.http, format!("<@{}> is now the DJ.", new_dj.0))
            .await,
    );

    Ok(())
}

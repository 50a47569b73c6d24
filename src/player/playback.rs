//! The I/O half of the coordinator: starting tracks, reacting to track end
//! and voice-state events, executing authorized actions, tearing down.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::thread_rng;
use serenity::async_trait;
use serenity::client::Context;
use serenity::model::id::GuildId;
use serenity::model::voice::VoiceState;
use songbird::input::ytdl;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::controller;
use super::session::{Advance, PlaybackState, Session};
use super::track::QueuedTrack;
use super::votes::VoteAction;
use crate::error::{BotError, BotResult};

/// Moves the session to the next queued track. Safe to call from anywhere:
/// the session state machine rejects the call unless the session is idle.
pub async fn advance(ctx: &Context, guild_id: GuildId) {
    let registry = super::registry(ctx).await;

    loop {
        let session = match registry.get(guild_id) {
            Some(session) => session,
            None => return,
        };

        let step = { session.lock().await.begin_advance() };

        match step {
            Advance::Busy => return,
            Advance::Empty { generation } => {
                let timeout = { session.lock().await.idle_timeout };
                arm_idle_watchdog(ctx.clone(), guild_id, generation, timeout);
                controller::refresh(ctx, &session).await;
                return;
            }
            Advance::Next(track) => {
                let title = track.title.clone();

                match start_track(ctx, guild_id, &session, track).await {
                    Ok(()) => {
                        controller::refresh(ctx, &session).await;
                        return;
                    }
                    Err(why) => {
                        warn!("Could not start '{title}' on guild {}: {why}", guild_id.0);

                        let text_channel = { session.lock().await.text_channel };
                        let notice = format!("Could not play **{title}**, skipping it.");
                        if let Err(why) = text_channel.say(&ctx.http, notice).await {
                            info!("Error sending message: {why:?}");
                        }

                        session.lock().await.fetch_failed();
                        // Keep draining until a track starts or the queue runs dry.
                    }
                }
            }
        }
    }
}

async fn start_track(
    ctx: &Context,
    guild_id: GuildId,
    session: &Arc<Mutex<Session>>,
    track: QueuedTrack,
) -> BotResult<()> {
    let source = ytdl(&track.url).await?;

    let manager = songbird::get(ctx).await.ok_or(BotError::MissingSongbird)?;
    let call = manager.get(guild_id).ok_or(BotError::NotConnected)?;

    let handle = {
        let mut call = call.lock().await;
        call.stop();
        call.play_source(source)
    };

    handle.add_event(
        Event::Track(TrackEvent::End),
        TrackEndNotifier {
            ctx: ctx.clone(),
            guild_id,
        },
    )?;

    let mut locked = session.lock().await;
    let _ = handle.set_volume(locked.volume as f32 / 100.0);
    locked.handle = Some(handle);
    info!("Now playing '{}' on guild {}", track.title, guild_id.0);
    locked.track_started(track);

    Ok(())
}

/// Runs the playback operation behind a vote action. Authorization happened
/// at the command boundary; a missing session or track is a silent no-op by
/// the time execution was already agreed on.
pub async fn execute_action(ctx: &Context, guild_id: GuildId, action: VoteAction) -> BotResult<()> {
    let registry = super::registry(ctx).await;
    let session = match registry.get(guild_id) {
        Some(session) => session,
        None => return Ok(()),
    };

    match action {
        VoteAction::Pause => {
            {
                let mut locked = session.lock().await;
                if let Some(handle) = &locked.handle {
                    handle.pause()?;
                }
                locked.set_paused(true);
            }
            controller::refresh(ctx, &session).await;
        }
        VoteAction::Resume => {
            {
                let mut locked = session.lock().await;
                if let Some(handle) = &locked.handle {
                    handle.play()?;
                }
                locked.set_paused(false);
            }
            controller::refresh(ctx, &session).await;
        }
        VoteAction::Skip => {
            // Stopping the current track fires the end notifier, which
            // advances the queue.
            let handle = { session.lock().await.handle.clone() };
            if let Some(handle) = handle {
                handle.stop()?;
            }
        }
        VoteAction::Stop => teardown(ctx, guild_id).await,
        VoteAction::Shuffle => {
            {
                let mut locked = session.lock().await;
                locked.queue.make_contiguous().shuffle(&mut thread_rng());
            }
            controller::refresh(ctx, &session).await;
        }
        VoteAction::Clear => {
            {
                session.lock().await.queue.clear();
            }
            controller::refresh(ctx, &session).await;
        }
    }

    Ok(())
}

/// Destroys the guild's session: control message, voice handler, state.
/// Idempotent; whoever wins the registry removal does the cleanup.
pub async fn teardown(ctx: &Context, guild_id: GuildId) {
    let registry = super::registry(ctx).await;
    let session = match registry.remove(guild_id) {
        Some(session) => session,
        None => return,
    };

    let (text_channel, control_message, handle) = {
        let mut locked = session.lock().await;
        locked.queue.clear();
        locked.votes.clear_all();
        locked.current = None;
        locked.state = PlaybackState::Idle;
        (
            locked.text_channel,
            locked.control_message.take(),
            locked.handle.take(),
        )
    };

    if let Some(handle) = handle {
        let _ = handle.stop();
    }

    if let Some(message_id) = control_message {
        // The message may have been deleted by hand already.
        let _ = text_channel.delete_message(&ctx.http, message_id).await;
    }

    if let Some(manager) = songbird::get(ctx).await {
        if manager.get(guild_id).is_some() {
            if let Err(why) = manager.remove(guild_id).await {
                info!("Voice handler already gone on guild {}: {why:?}", guild_id.0);
            }
        }
    }

    info!("Session on guild {} torn down", guild_id.0);
}

fn arm_idle_watchdog(ctx: Context, guild_id: GuildId, generation: u64, after: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;

        let registry = super::registry(&ctx).await;
        let session = match registry.get(guild_id) {
            Some(session) => session,
            None => return,
        };

        let expired = {
            let locked = session.lock().await;
            locked.state == PlaybackState::Idle && locked.generation == generation
        };

        if expired {
            info!(
                "No track dequeued on guild {} for {:?}, disconnecting",
                guild_id.0, after
            );
            teardown(&ctx, guild_id).await;
        }
    });
}

struct TrackEndNotifier {
    ctx: Context,
    guild_id: GuildId,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(session) = super::registry(&self.ctx).await.get(self.guild_id) {
            session.lock().await.track_finished();
            advance(&self.ctx, self.guild_id).await;
        }

        None
    }
}

/// Keeps DJ assignment and vote quorums coherent with the voice channel.
/// Also tears the session down when the bot's own connection drops.
pub async fn handle_voice_state_update(ctx: &Context, old: Option<&VoiceState>, new: &VoiceState) {
    let guild_id = match new.guild_id.or_else(|| old.and_then(|state| state.guild_id)) {
        Some(guild_id) => guild_id,
        None => return,
    };

    let bot_id = ctx.cache.current_user_id();
    if new.user_id == bot_id {
        if new.channel_id.is_none() {
            info!("Bot voice state dropped on guild {}", guild_id.0);
            teardown(ctx, guild_id).await;
        }
        return;
    }

    let registry = super::registry(ctx).await;
    let session = match registry.get(guild_id) {
        Some(session) => session,
        None => return,
    };

    let voice_channel = { session.lock().await.voice_channel };
    let was_in = old.and_then(|state| state.channel_id) == Some(voice_channel);
    let is_in = new.channel_id == Some(voice_channel);
    if was_in == is_in {
        return;
    }

    let is_bot = new
        .member
        .as_ref()
        .map(|member| member.user.bot)
        .unwrap_or(false);

    let listeners = ctx
        .cache
        .guild(guild_id)
        .map(|guild| super::channel_listeners(&guild, voice_channel, bot_id))
        .unwrap_or_default();

    let mut locked = session.lock().await;

    // Quorum changed with the membership, so pending tallies are void.
    locked.votes.clear_all();

    if was_in && locked.dj == Some(new.user_id) {
        locked.dj = listeners.iter().copied().find(|id| *id != new.user_id);
        match locked.dj {
            Some(dj) => info!("DJ left; promoted {} on guild {}", dj.0, guild_id.0),
            None => info!("DJ left and nobody remains on guild {}", guild_id.0),
        }
    } else if is_in && locked.dj.is_none() && !is_bot {
        locked.dj = Some(new.user_id);
        info!("Promoted {} to DJ on guild {}", new.user_id.0, guild_id.0);
    }
}

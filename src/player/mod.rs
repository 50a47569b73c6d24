//! Per-guild playback sessions: queue, votes, DJ, control message.

pub mod controller;
pub mod playback;
pub mod session;
pub mod track;
pub mod votes;

use std::sync::Arc;

use dashmap::DashMap;
use serenity::client::Context;
use serenity::model::guild::Guild;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::TypeMapKey;
use tokio::sync::Mutex;

pub use session::{Advance, PlaybackState, Session};
pub use track::QueuedTrack;
pub use votes::{required_votes, VoteAction};

/// All live sessions, keyed by guild. Mutation of a guild's playback state
/// goes through that guild's mutex; the map itself only tracks existence.
pub struct SessionRegistry {
    sessions: DashMap<u64, Arc<Mutex<Session>>>,
}

pub struct PlayerKey;

impl TypeMapKey for PlayerKey {
    type Value = Arc<SessionRegistry>;
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(&guild_id.0).map(|entry| Arc::clone(&entry))
    }

    pub fn insert(&self, guild_id: GuildId, session: Session) -> Arc<Mutex<Session>> {
        let session = Arc::new(Mutex::new(session));
        self.sessions.insert(guild_id.0, Arc::clone(&session));
        session
    }

    /// Removing is how teardown stays idempotent: only the caller that wins
    /// the removal performs cleanup.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.remove(&guild_id.0).map(|(_, session)| session)
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id.0)
    }
}

pub(crate) async fn registry(ctx: &Context) -> Arc<SessionRegistry> {
    ctx.data
        .read()
        .await
        .get::<PlayerKey>()
        .cloned()
        .expect("Session registry placed in at initialisation.")
}

/// Non-bot members currently in `voice_channel`. Members missing from the
/// cache are assumed human.
pub fn channel_listeners(guild: &Guild, voice_channel: ChannelId, bot_id: UserId) -> Vec<UserId> {
    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(voice_channel))
        .map(|state| state.user_id)
        .filter(|user_id| *user_id != bot_id)
        .filter(|user_id| {
            guild
                .members
                .get(user_id)
                .map(|member| !member.user.bot)
                .unwrap_or(true)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn removal_is_first_winner_only() {
        let registry = SessionRegistry::new();
        let guild = GuildId(99);

        registry.insert(
            guild,
            Session::new(ChannelId(1), ChannelId(2), None, 100, Duration::from_secs(300)),
        );
        assert!(registry.contains(guild));

        assert!(registry.remove(guild).is_some());
        // The second teardown path finds nothing and must not error.
        assert!(registry.remove(guild).is_none());
        assert!(!registry.contains(guild));
        assert!(registry.get(guild).is_none());
    }
}

use std::collections::VecDeque;
use std::time::Duration;

use serenity::model::id::{ChannelId, MessageId, UserId};
use songbird::tracks::TrackHandle;

use super::track::QueuedTrack;
use super::votes::VoteBox;

/// Playback phases of a session. `advance` only makes progress from `Idle`,
/// which is what keeps concurrent calls from dequeuing two tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Fetching,
    Playing,
    Paused,
}

/// Result of asking a session to move to the next track.
pub enum Advance {
    /// A fetch is in flight or a track is already playing.
    Busy,
    /// The queue head was taken; the session is now `Fetching`.
    Next(QueuedTrack),
    /// Nothing queued. The generation lets the idle watchdog tell "still
    /// nothing happened" apart from "played and went idle again".
    Empty { generation: u64 },
}

/// Per-guild playback state. Always lives behind the registry's per-guild
/// mutex; nothing here performs I/O.
pub struct Session {
    pub text_channel: ChannelId,
    pub voice_channel: ChannelId,
    pub queue: VecDeque<QueuedTrack>,
    pub current: Option<QueuedTrack>,
    pub handle: Option<TrackHandle>,
    pub state: PlaybackState,
    pub dj: Option<UserId>,
    pub votes: VoteBox,
    pub volume: u8,
    pub idle_timeout: Duration,
    pub control_message: Option<MessageId>,
    pub generation: u64,
}

impl Session {
    pub fn new(
        text_channel: ChannelId,
        voice_channel: ChannelId,
        dj: Option<UserId>,
        volume: u8,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            text_channel,
            voice_channel,
            queue: VecDeque::new(),
            current: None,
            handle: None,
            state: PlaybackState::Idle,
            dj,
            votes: VoteBox::default(),
            volume,
            idle_timeout,
            control_message: None,
            generation: 0,
        }
    }

    /// Appends tracks in the given order. Returns whether the caller should
    /// follow up with an `advance` (nothing playing, nothing being fetched).
    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = QueuedTrack>) -> bool {
        self.queue.extend(tracks);
        self.state == PlaybackState::Idle
    }

    pub fn begin_advance(&mut self) -> Advance {
        if self.state != PlaybackState::Idle {
            return Advance::Busy;
        }

        match self.queue.pop_front() {
            Some(track) => {
                self.state = PlaybackState::Fetching;
                self.generation += 1;
                Advance::Next(track)
            }
            None => Advance::Empty {
                generation: self.generation,
            },
        }
    }

    /// The fetched source could not be played; the popped track is dropped
    /// and the session may advance again.
    pub fn fetch_failed(&mut self) {
        if self.state == PlaybackState::Fetching {
            self.state = PlaybackState::Idle;
        }
    }

    /// A new track became current: votes from the previous one are void.
    pub fn track_started(&mut self, track: QueuedTrack) {
        self.current = Some(track);
        self.state = PlaybackState::Playing;
        self.votes.clear_all();
    }

    pub fn track_finished(&mut self) {
        self.current = None;
        self.handle = None;
        self.state = PlaybackState::Idle;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.state = match (self.state, paused) {
            (PlaybackState::Playing, true) => PlaybackState::Paused,
            (PlaybackState::Paused, false) => PlaybackState::Playing,
            (state, _) => state,
        };
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, requester: u64) -> QueuedTrack {
        QueuedTrack {
            title: title.to_string(),
            url: format!("https://tracks.example/{title}"),
            duration: None,
            thumbnail: None,
            requested_by: UserId(requester),
        }
    }

    fn session() -> Session {
        Session::new(
            ChannelId(10),
            ChannelId(20),
            Some(UserId(1)),
            100,
            Duration::from_secs(300),
        )
    }

    #[test]
    fn enqueue_requests_advance_only_while_idle() {
        let mut s = session();

        assert!(s.enqueue([track("a", 1)]));

        match s.begin_advance() {
            Advance::Next(t) => s.track_started(t),
            _ => panic!("expected a track"),
        }

        assert!(!s.enqueue([track("b", 1)]));
        assert_eq!(s.queue.len(), 1);
    }

    #[test]
    fn advance_is_a_noop_while_fetching_or_playing() {
        let mut s = session();
        s.enqueue([track("a", 1), track("b", 1)]);

        let first = match s.begin_advance() {
            Advance::Next(t) => t,
            _ => panic!("expected a track"),
        };

        // A fetch is in flight: a concurrent advance must not pop "b".
        assert!(matches!(s.begin_advance(), Advance::Busy));
        assert_eq!(s.queue.len(), 1);

        s.track_started(first);
        assert!(matches!(s.begin_advance(), Advance::Busy));
        assert_eq!(s.queue.len(), 1);
    }

    #[test]
    fn failed_fetch_lets_the_next_track_through() {
        let mut s = session();
        s.enqueue([track("broken", 1), track("fine", 1)]);

        assert!(matches!(s.begin_advance(), Advance::Next(_)));
        s.fetch_failed();

        match s.begin_advance() {
            Advance::Next(t) => assert_eq!(t.title, "fine"),
            _ => panic!("expected the second track"),
        }
    }

    #[test]
    fn empty_queue_reports_the_current_generation() {
        let mut s = session();

        let before = match s.begin_advance() {
            Advance::Empty { generation } => generation,
            _ => panic!("expected empty"),
        };

        s.enqueue([track("a", 1)]);
        match s.begin_advance() {
            Advance::Next(t) => s.track_started(t),
            _ => panic!("expected a track"),
        }
        s.track_finished();

        match s.begin_advance() {
            Advance::Empty { generation } => assert!(generation > before),
            _ => panic!("expected empty"),
        }
    }

    #[test]
    fn starting_a_track_clears_stale_votes() {
        use super::super::votes::VoteAction;

        let mut s = session();
        s.votes.cast(VoteAction::Skip, UserId(5));
        s.enqueue([track("a", 1)]);

        match s.begin_advance() {
            Advance::Next(t) => s.track_started(t),
            _ => panic!("expected a track"),
        }

        assert_eq!(s.votes.count(VoteAction::Skip), 0);
    }

    #[test]
    fn skip_votes_gate_the_next_track_at_quorum() {
        use super::super::votes::{required_votes, VoteAction};

        let mut s = session();
        s.enqueue([track("one", 1), track("two", 1), track("three", 1)]);

        match s.begin_advance() {
            Advance::Next(t) => s.track_started(t),
            _ => panic!("expected a track"),
        }
        assert_eq!(s.current.as_ref().map(|t| t.title.as_str()), Some("one"));

        // Five listeners, no privilege: two distinct skip votes needed.
        let needed = required_votes(VoteAction::Skip, 5);
        assert_eq!(needed, 2);

        assert!(s.votes.cast(VoteAction::Skip, UserId(2)) < needed);
        assert_eq!(s.current.as_ref().map(|t| t.title.as_str()), Some("one"));

        assert!(s.votes.cast(VoteAction::Skip, UserId(3)) >= needed);
        s.votes.clear(VoteAction::Skip);
        s.track_finished();
        match s.begin_advance() {
            Advance::Next(t) => s.track_started(t),
            _ => panic!("expected a track"),
        }

        assert_eq!(s.current.as_ref().map(|t| t.title.as_str()), Some("two"));
        assert_eq!(s.queue.len(), 1);
    }

    #[test]
    fn pause_toggling_only_moves_between_live_states() {
        let mut s = session();
        s.enqueue([track("a", 1)]);
        match s.begin_advance() {
            Advance::Next(t) => s.track_started(t),
            _ => panic!("expected a track"),
        }

        s.set_paused(true);
        assert_eq!(s.state, PlaybackState::Paused);
        s.set_paused(true);
        assert_eq!(s.state, PlaybackState::Paused);
        s.set_paused(false);
        assert_eq!(s.state, PlaybackState::Playing);

        s.track_finished();
        s.set_paused(true);
        assert_eq!(s.state, PlaybackState::Idle);
    }
}

use std::collections::HashSet;

use serenity::model::id::UserId;

/// The disruptive playback actions a listener can vote for. Each maps to a
/// direct playback operation; there is no dispatch by command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Pause,
    Resume,
    Skip,
    Stop,
    Shuffle,
    Clear,
}

impl VoteAction {
    pub fn verb(self) -> &'static str {
        match self {
            VoteAction::Pause => "pause the track",
            VoteAction::Resume => "resume the track",
            VoteAction::Skip => "skip the track",
            VoteAction::Stop => "stop playback",
            VoteAction::Shuffle => "shuffle the queue",
            VoteAction::Clear => "clear the queue",
        }
    }
}

/// Distinct-voter sets, one per action, scoped to a single session.
#[derive(Debug, Default)]
pub struct VoteBox {
    pause: HashSet<UserId>,
    resume: HashSet<UserId>,
    skip: HashSet<UserId>,
    stop: HashSet<UserId>,
    shuffle: HashSet<UserId>,
    clear: HashSet<UserId>,
}

impl VoteBox {
    fn set_mut(&mut self, action: VoteAction) -> &mut HashSet<UserId> {
        match action {
            VoteAction::Pause => &mut self.pause,
            VoteAction::Resume => &mut self.resume,
            VoteAction::Skip => &mut self.skip,
            VoteAction::Stop => &mut self.stop,
            VoteAction::Shuffle => &mut self.shuffle,
            VoteAction::Clear => &mut self.clear,
        }
    }

    /// Records a vote and returns the distinct-voter count for the action.
    pub fn cast(&mut self, action: VoteAction, voter: UserId) -> usize {
        let set = self.set_mut(action);
        set.insert(voter);
        set.len()
    }

    pub fn count(&self, action: VoteAction) -> usize {
        match action {
            VoteAction::Pause => self.pause.len(),
            VoteAction::Resume => self.resume.len(),
            VoteAction::Skip => self.skip.len(),
            VoteAction::Stop => self.stop.len(),
            VoteAction::Shuffle => self.shuffle.len(),
            VoteAction::Clear => self.clear.len(),
        }
    }

    pub fn clear(&mut self, action: VoteAction) {
        self.set_mut(action).clear();
    }

    pub fn clear_all(&mut self) {
        self.pause.clear();
        self.resume.clear();
        self.skip.clear();
        self.stop.clear();
        self.shuffle.clear();
        self.clear.clear();
    }
}

/// Votes required to authorize `action` with `listeners` non-bot members in
/// the voice channel. Stop and skip keep their hard-coded quorum of 2 when
/// exactly three listeners are present.
pub fn required_votes(action: VoteAction, listeners: usize) -> usize {
    if listeners == 3 && matches!(action, VoteAction::Skip | VoteAction::Stop) {
        return 2;
    }

    ((listeners.saturating_sub(1)) as f32 / 2.5).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_follows_the_documented_curve() {
        assert_eq!(required_votes(VoteAction::Pause, 1), 0);
        assert_eq!(required_votes(VoteAction::Pause, 2), 1);
        assert_eq!(required_votes(VoteAction::Pause, 3), 1);
        assert_eq!(required_votes(VoteAction::Pause, 5), 2);
        assert_eq!(required_votes(VoteAction::Pause, 6), 2);
        assert_eq!(required_votes(VoteAction::Pause, 8), 3);
        assert_eq!(required_votes(VoteAction::Shuffle, 3), 1);
    }

    #[test]
    fn skip_and_stop_need_two_votes_with_three_listeners() {
        assert_eq!(required_votes(VoteAction::Skip, 3), 2);
        assert_eq!(required_votes(VoteAction::Stop, 3), 2);
        assert_eq!(required_votes(VoteAction::Skip, 4), 2);
        assert_eq!(required_votes(VoteAction::Skip, 2), 1);
    }

    #[test]
    fn repeat_votes_from_one_member_count_once() {
        let mut votes = VoteBox::default();

        assert_eq!(votes.cast(VoteAction::Skip, UserId(1)), 1);
        assert_eq!(votes.cast(VoteAction::Skip, UserId(1)), 1);
        assert_eq!(votes.cast(VoteAction::Skip, UserId(2)), 2);
    }

    #[test]
    fn vote_sets_are_independent_per_action() {
        let mut votes = VoteBox::default();

        votes.cast(VoteAction::Skip, UserId(1));
        votes.cast(VoteAction::Stop, UserId(1));
        votes.clear(VoteAction::Skip);

        assert_eq!(votes.count(VoteAction::Skip), 0);
        assert_eq!(votes.count(VoteAction::Stop), 1);
    }

    #[test]
    fn clear_all_resets_every_set() {
        let mut votes = VoteBox::default();

        votes.cast(VoteAction::Pause, UserId(1));
        votes.cast(VoteAction::Resume, UserId(2));
        votes.cast(VoteAction::Clear, UserId(3));
        votes.clear_all();

        assert_eq!(votes.count(VoteAction::Pause), 0);
        assert_eq!(votes.count(VoteAction::Resume), 0);
        assert_eq!(votes.count(VoteAction::Clear), 0);
    }
}

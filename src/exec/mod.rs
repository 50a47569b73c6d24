//! Remote code execution: parse a fenced code block out of a command
//! invocation, dispatch it to the sandbox API, shape the answer, and keep
//! the reply editable when the invocation itself gets edited.

pub mod client;
pub mod languages;
pub mod output;
pub mod parser;

use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::{ChannelId, MessageId};
use serenity::prelude::TypeMapKey;
use tracing::warn;

pub use client::{ExecError, SandboxClient, SandboxKey};

pub const COMMAND_NAMES: &[&str] = &["run", "eval", "exec"];

/// Invocation message id to the bot's reply, so an edited invocation can be
/// rerun into the same reply instead of posting a new one.
pub struct ExecTracker {
    replies: DashMap<u64, (ChannelId, MessageId)>,
}

pub struct ExecTrackerKey;

impl TypeMapKey for ExecTrackerKey {
    type Value = Arc<ExecTracker>;
}

impl ExecTracker {
    pub fn new() -> Self {
        Self {
            replies: DashMap::new(),
        }
    }

    pub fn remember(&self, invocation: MessageId, channel: ChannelId, reply: MessageId) {
        self.replies.insert(invocation.0, (channel, reply));
    }

    pub fn reply_for(&self, invocation: MessageId) -> Option<(ChannelId, MessageId)> {
        self.replies.get(&invocation.0).map(|entry| *entry)
    }

    pub fn forget(&self, invocation: MessageId) {
        self.replies.remove(&invocation.0);
    }
}

/// Recovers the builder input from a raw message, for reruns on edit where
/// no framework `Args` exist. Returns the text after the command word.
pub fn strip_invocation<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = content.strip_prefix(prefix)?.trim_start();

    for name in COMMAND_NAMES {
        if let Some(after) = rest.strip_prefix(name) {
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                return Some(after);
            }
        }
    }

    None
}

/// The whole builder pipeline, shared by the command and the edit rerun.
/// Always produces a user-facing message; defects and service failures are
/// phrased, never raised.
pub async fn build_reply(sandbox: &SandboxClient, input: &str) -> String {
    let request = match parser::parse_request(input) {
        Ok(request) => request,
        Err(why) => return format!("That won't run: {why}."),
    };

    let language = match languages::resolve(&request.language) {
        Some(language) => language,
        None => {
            let name = request.language.replace('`', "");
            return format!("I don't know how to run `{name}`. See `languages` for what I support.");
        }
    };

    let source = languages::apply_boilerplate(language, &request.source);

    match sandbox.execute(language, &source, &request.args).await {
        Ok(raw) => output::shape_output(&raw),
        Err(why) => {
            warn!("Sandbox dispatch failed: {why}");
            format!("Execution failed: {why}. Try again in a bit.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocations_are_stripped_down_to_builder_input() {
        assert_eq!(
            strip_invocation("!run py\n```py\nprint(1)\n```", "!"),
            Some(" py\n```py\nprint(1)\n```")
        );
        assert_eq!(strip_invocation("!eval\n```py\nx\n```", "!"), Some("\n```py\nx\n```"));
        assert_eq!(strip_invocation("!runner stuff", "!"), None);
        assert_eq!(strip_invocation("run py", "!"), None);
        assert_eq!(strip_invocation("?play song", "?"), None);
    }

    #[test]
    fn tracker_round_trips_and_forgets() {
        let tracker = ExecTracker::new();
        let invocation = MessageId(1);

        tracker.remember(invocation, ChannelId(2), MessageId(3));
        assert_eq!(
            tracker.reply_for(invocation),
            Some((ChannelId(2), MessageId(3)))
        );

        tracker.forget(invocation);
        assert_eq!(tracker.reply_for(invocation), None);
    }
}

//! The per-session control message: a single embed the bot keeps editing in
//! place. If other messages have landed in the channel since, the old embed
//! is deleted and a fresh one posted at the bottom instead, so playback
//! state never updates far up the scrollback.

use std::collections::VecDeque;
use std::sync::Arc;

use serenity::builder::CreateEmbed;
use serenity::client::Context;
use serenity::utils::Colour;
use tokio::sync::Mutex;
use tracing::info;

use super::session::{PlaybackState, Session};
use super::track::{format_duration, QueuedTrack};

const EMBED_COLOUR: Colour = Colour::BLURPLE;
const UP_NEXT_PREVIEW: usize = 5;

struct ControlView {
    heading: &'static str,
    title: String,
    url: Option<String>,
    duration: Option<String>,
    requester: Option<String>,
    thumbnail: Option<String>,
    volume: u8,
    up_next: Vec<String>,
    remaining: usize,
}

fn render(session: &Session) -> ControlView {
    let (up_next, remaining) = queue_preview(&session.queue);

    match &session.current {
        Some(track) => ControlView {
            heading: if session.state == PlaybackState::Paused {
                "Paused"
            } else {
                "Now playing"
            },
            title: track.title.clone(),
            url: Some(track.url.clone()),
            duration: track.duration.map(format_duration),
            requester: Some(format!("<@{}>", track.requested_by.0)),
            thumbnail: track.thumbnail.clone(),
            volume: session.volume,
            up_next,
            remaining,
        },
        None => ControlView {
            heading: "Nothing playing",
            title: "The queue is empty".to_string(),
            url: None,
            duration: None,
            requester: None,
            thumbnail: None,
            volume: session.volume,
            up_next,
            remaining,
        },
    }
}

fn queue_preview(queue: &VecDeque<QueuedTrack>) -> (Vec<String>, usize) {
    let preview = queue
        .iter()
        .take(UP_NEXT_PREVIEW)
        .enumerate()
        .map(|(index, track)| format!("{} - {}", index + 1, track.title))
        .collect::<Vec<_>>();

    (preview, queue.len().saturating_sub(UP_NEXT_PREVIEW))
}

fn apply_embed<'a>(embed: &'a mut CreateEmbed, view: &ControlView) -> &'a mut CreateEmbed {
    embed.colour(EMBED_COLOUR);
    embed.author(|author| author.name(view.heading));
    embed.title(&view.title);

    if let Some(url) = &view.url {
        embed.url(url);
    }
    if let Some(thumbnail) = &view.thumbnail {
        embed.thumbnail(thumbnail);
    }
    if let Some(duration) = &view.duration {
        embed.field("Duration", duration, true);
    }
    if let Some(requester) = &view.requester {
        embed.field("Requested by", requester, true);
    }
    embed.field("Volume", format!("{}%", view.volume), true);

    if !view.up_next.is_empty() {
        let mut listing = view.up_next.join("\n");
        if view.remaining > 0 {
            listing.push_str(&format!("\nand {} more", view.remaining));
        }
        embed.field("Up next", listing, false);
    }

    embed
}

/// Brings the control message in line with the session. Holding the session
/// lock across the HTTP calls serializes refreshes per guild, so two
/// concurrent commands cannot each post their own control message.
pub async fn refresh(ctx: &Context, session: &Arc<Mutex<Session>>) {
    let mut locked = session.lock().await;
    let view = render(&locked);
    let channel = locked.text_channel;

    let still_latest = match locked.control_message {
        Some(control_id) => channel
            .messages(&ctx.http, |retriever| retriever.limit(1))
            .await
            .ok()
            .and_then(|mut batch| batch.pop())
            .map(|latest| latest.id == control_id)
            .unwrap_or(false),
        None => false,
    };

    if still_latest {
        let control_id = locked.control_message.expect("checked above");
        match channel
            .edit_message(&ctx.http, control_id, |m| m.embed(|e| apply_embed(e, &view)))
            .await
        {
            Ok(_) => return,
            Err(why) => {
                info!("Control message edit failed, recreating: {why:?}");
                locked.control_message = None;
            }
        }
    }

    if let Some(old) = locked.control_message.take() {
        // Deleting may race with manual deletion; that is fine.
        let _ = channel.delete_message(&ctx.http, old).await;
    }

    match channel
        .send_message(&ctx.http, |m| m.embed(|e| apply_embed(e, &view)))
        .await
    {
        Ok(message) => locked.control_message = Some(message.id),
        Err(why) => info!("Could not send the control message: {why:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serenity::model::id::{ChannelId, UserId};

    use super::*;

    fn track(title: &str) -> QueuedTrack {
        QueuedTrack {
            title: title.to_string(),
            url: format!("https://tracks.example/{title}"),
            duration: Some(Duration::from_secs(185)),
            thumbnail: None,
            requested_by: UserId(9),
        }
    }

    fn session_with_queue(titles: &[&str]) -> Session {
        let mut session = Session::new(
            ChannelId(1),
            ChannelId(2),
            None,
            80,
            Duration::from_secs(300),
        );
        session.queue.extend(titles.iter().map(|t| track(t)));
        session
    }

    #[test]
    fn preview_caps_at_five_and_counts_the_rest() {
        let session = session_with_queue(&["a", "b", "c", "d", "e", "f", "g"]);
        let (preview, remaining) = queue_preview(&session.queue);

        assert_eq!(preview.len(), 5);
        assert_eq!(preview[0], "1 - a");
        assert_eq!(remaining, 2);
    }

    #[test]
    fn idle_session_renders_the_empty_view() {
        let session = session_with_queue(&[]);
        let view = render(&session);

        assert_eq!(view.heading, "Nothing playing");
        assert!(view.url.is_none());
        assert_eq!(view.volume, 80);
    }

    #[test]
    fn playing_session_renders_track_details() {
        let mut session = session_with_queue(&["next"]);
        session.track_started(track("current"));
        let view = render(&session);

        assert_eq!(view.heading, "Now playing");
        assert_eq!(view.title, "current");
        assert_eq!(view.duration.as_deref(), Some("3:05"));
        assert_eq!(view.requester.as_deref(), Some("<@9>"));
        assert_eq!(view.up_next, vec!["1 - next".to_string()]);
    }
}

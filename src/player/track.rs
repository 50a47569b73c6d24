use std::time::Duration;

use serde::Deserialize;
use serenity::model::id::UserId;
use songbird::input::{ytdl, ytdl_search};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{BotError, BotResult};

const UNKNOWN_TRACK_TITLE: &str = "Unknown track";

/// A track waiting in (or taken from) a session queue. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrack {
    pub title: String,
    pub url: String,
    pub duration: Option<Duration>,
    pub thumbnail: Option<String>,
    pub requested_by: UserId,
}

/// One line of `yt-dlp -j --flat-playlist` output. Only the fields we
/// consume; the rest of the JSON object is ignored.
#[derive(Deserialize)]
struct PlaylistEntry {
    url: String,
    title: Option<String>,
    duration: Option<f64>,
}

/// Resolves user input to zero or more playable tracks. A playlist URL
/// expands to all of its entries in source order; a plain URL or a search
/// query yields at most one track. An empty result means "nothing found",
/// which callers report as a normal outcome.
pub async fn resolve_request(input: &str, requester: UserId) -> BotResult<Vec<QueuedTrack>> {
    let is_url = input.starts_with("http");

    if is_url && (input.contains("&list=") || input.contains("?list=")) {
        info!("Resolving playlist {input}");
        return playlist_tracks(input, requester).await;
    }

    let source = if is_url {
        ytdl(input).await
    } else {
        ytdl_search(input).await
    };

    let input_handle = match source {
        Ok(handle) => handle,
        Err(why) => {
            info!("No track resolved for '{input}': {why:?}");
            return Ok(Vec::new());
        }
    };

    let metadata = input_handle.metadata;
    let url = match metadata.source_url {
        Some(url) => url,
        None => return Ok(Vec::new()),
    };

    Ok(vec![QueuedTrack {
        title: metadata.title.unwrap_or_else(|| UNKNOWN_TRACK_TITLE.to_string()),
        url,
        duration: metadata.duration,
        thumbnail: metadata.thumbnail,
        requested_by: requester,
    }])
}

async fn playlist_tracks(url: &str, requester: UserId) -> BotResult<Vec<QueuedTrack>> {
    let output = Command::new("yt-dlp")
        .arg("-j")
        .arg("--flat-playlist")
        .arg(url)
        .output()
        .await
        .map_err(|why| BotError::Input(songbird::input::error::Error::Io(why)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut tracks = Vec::new();
    let mut skipped = 0usize;

    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        match serde_json::from_str::<PlaylistEntry>(line) {
            Ok(entry) => tracks.push(QueuedTrack {
                title: entry.title.unwrap_or_else(|| UNKNOWN_TRACK_TITLE.to_string()),
                url: entry.url,
                duration: entry.duration.map(Duration::from_secs_f64),
                thumbnail: None,
                requested_by: requester,
            }),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {skipped} unparseable playlist entries from {url}");
    }

    Ok(tracks)
}

/// `"3:05"` / `"1:02:09"` rendering for embeds and queue listings.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:0>2}:{seconds:0>2}")
    } else {
        format!("{minutes}:{seconds:0>2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_like_a_clock() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(185)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3729)), "1:02:09");
    }
}

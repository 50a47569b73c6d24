use thiserror::Error;

pub type BotResult<T> = Result<T, BotError>;

/// Failures that cross module boundaries. Expected negative outcomes
/// (no track found, below quorum, caller not in a voice channel) are
/// modelled as values, not as variants here.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("discord api call failed: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("could not join the voice channel: {0}")]
    Join(#[from] songbird::error::JoinError),

    #[error("track control failed: {0}")]
    Track(#[from] songbird::tracks::TrackError),

    #[error("could not load the track source: {0}")]
    Input(#[from] songbird::input::error::Error),

    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("songbird voice client was not registered at startup")]
    MissingSongbird,

    #[error("the bot is not connected to a voice channel in this guild")]
    NotConnected,
}

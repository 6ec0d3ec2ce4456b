use thiserror::Error;

/// Errors surfaced by the playback core.
///
/// Stale completion callbacks have no variant: they are dropped inside the
/// session actor and never reach a caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    /// The query matched a disallowed link pattern. Rejected before resolution.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The source is unavailable, private or yielded no results.
    #[error("could not resolve track: {0}")]
    Resolution(String),

    /// Play-time re-resolution failed. Handled inside the session as a skip.
    #[error("could not refresh stream: {0}")]
    StreamRefresh(String),

    /// Voice connection or playback transport failure.
    #[error("voice transport failed: {0}")]
    Transport(String),

    #[error("nothing is playing")]
    NothingPlaying,

    #[error("queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    #[error("no active session")]
    NoSession,

    /// The session was torn down while the request was in flight.
    #[error("session closed")]
    SessionClosed,
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;

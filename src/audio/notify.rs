use super::queue::SessionKey;
use crate::storage::Language;

/// Events the playback core emits for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    TrackEnqueued {
        title: String,
        duration_seconds: u64,
        position: usize,
    },
    NowPlaying {
        title: String,
        duration_seconds: u64,
        url: String,
    },
    LoopToggled {
        enabled: bool,
    },
    SessionLeft,
    /// A transport failure, surfaced once per failed attempt.
    PlaybackFailed {
        title: String,
        reason: String,
    },
}

/// Receives notices. Implementations must not block: they are called from
/// inside a session's event loop.
pub trait Notifier: Send + Sync {
    fn notify(&self, key: SessionKey, language: Language, notice: SessionNotice);
}

//! Playback transport contract.
//!
//! The core only decides what to hand to the transport and when. Encoding,
//! RTP and voice signaling live behind these traits.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::session::SessionEvent;
use crate::{error::PlayerResult, sources::ResolvedStream};

/// Where a session plays: one voice channel in one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceTarget {
    pub guild_id: u64,
    pub channel_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub volume: f32,
    /// Run every track through a loudness normalization filter.
    pub normalize: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            volume: 0.5,
            normalize: true,
        }
    }
}

/// One-shot completion token for a single play attempt.
///
/// Firing it only posts an event to the owning session; the session decides
/// what to do. If the session is gone the event is dropped.
#[derive(Debug)]
pub struct CompletionSignal {
    events: mpsc::UnboundedSender<SessionEvent>,
    attempt: u64,
}

impl CompletionSignal {
    pub(crate) fn new(events: mpsc::UnboundedSender<SessionEvent>, attempt: u64) -> Self {
        Self { events, attempt }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn complete(self) {
        let _ = self.events.send(SessionEvent::Completed {
            attempt: self.attempt,
        });
    }
}

/// Opens voice connections. Shared by all sessions.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn connect(&self, target: VoiceTarget) -> PlayerResult<Box<dyn VoiceConnection>>;
}

/// A voice connection exclusively owned by one session.
#[async_trait]
pub trait VoiceConnection: Send {
    /// Starts playing `stream`. The transport must fire `on_end` exactly once,
    /// when the track ends, errors, or is stopped.
    async fn play(
        &mut self,
        stream: &ResolvedStream,
        options: PlayOptions,
        on_end: CompletionSignal,
    ) -> PlayerResult<Box<dyn ActivePlayback>>;

    async fn disconnect(&mut self);
}

/// Handle to the in-flight track.
pub trait ActivePlayback: Send {
    /// Interrupts playback. Calling it after the track ended is harmless.
    fn stop(&self);
}

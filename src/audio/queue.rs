use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, VecDeque},
    fmt,
};
use tracing::debug;

use super::sink::VoiceTarget;
use crate::{sources::TrackMetadata, storage::Language};

/// Stable identifier of a session (the guild it plays in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(pub u64);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VoiceTarget> for SessionKey {
    fn from(target: VoiceTarget) -> Self {
        Self(target.guild_id)
    }
}

/// A queued track. Identity fields never change after enqueue; play-time
/// resolution produces a separate [`crate::sources::ResolvedStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrack {
    pub external_id: String,
    pub canonical_url: String,
    pub title: String,
    pub duration_seconds: u64,
    pub added_at: DateTime<Utc>,
}

impl From<TrackMetadata> for QueuedTrack {
    fn from(metadata: TrackMetadata) -> Self {
        Self {
            external_id: metadata.external_id,
            canonical_url: metadata.canonical_url,
            title: metadata.title,
            duration_seconds: metadata.duration_seconds,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Playing,
}

/// Point-in-time copy of a session, for display and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub key: SessionKey,
    pub target: VoiceTarget,
    pub language: Language,
    pub status: SessionStatus,
    pub current: Option<QueuedTrack>,
    pub queue: Vec<QueuedTrack>,
    pub loop_enabled: bool,
    pub attempt: u64,
    pub pending_enqueues: usize,
}

#[cfg(test)]
impl SessionSnapshot {
    pub fn queue_titles(&self) -> Vec<&str> {
        self.queue.iter().map(|t| t.title.as_str()).collect()
    }

    pub fn current_title(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.title.as_str())
    }
}

/// Playback state of one session. Mutated only by that session's actor.
///
/// `attempt` identifies the current play attempt. Every transition that
/// supersedes a playback (advance, loop replay, skip, stop) bumps it, so a
/// completion carrying an older value is recognisably stale.
#[derive(Debug)]
pub struct GuildSession {
    key: SessionKey,
    target: VoiceTarget,
    language: Language,
    queue: VecDeque<QueuedTrack>,
    status: SessionStatus,
    current: Option<QueuedTrack>,
    loop_enabled: bool,
    attempt: u64,
}

impl GuildSession {
    pub fn new(target: VoiceTarget, language: Language) -> Self {
        Self {
            key: SessionKey::from(target),
            target,
            language,
            queue: VecDeque::new(),
            status: SessionStatus::Idle,
            current: None,
            loop_enabled: false,
            attempt: 0,
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn target(&self) -> VoiceTarget {
        self.target
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current(&self) -> Option<&QueuedTrack> {
        self.current.as_ref()
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.status == SessionStatus::Idle
    }

    /// Appends a track and returns its 1-based position behind the current track.
    pub fn push(&mut self, track: QueuedTrack) -> usize {
        self.queue.push_back(track);
        self.queue.len()
    }

    /// Puts a track back at the queue head.
    pub fn requeue_front(&mut self, track: QueuedTrack) {
        self.queue.push_front(track);
    }

    /// Pops the queue head into `current` and marks the session playing.
    ///
    /// Returns `None` without touching state unless the session is idle with
    /// a non-empty queue.
    pub fn begin_next(&mut self) -> Option<(u64, QueuedTrack)> {
        if self.status != SessionStatus::Idle {
            return None;
        }
        let track = self.queue.pop_front()?;
        self.attempt += 1;
        self.status = SessionStatus::Playing;
        self.current = Some(track.clone());
        debug!("Session {} attempt {}: {}", self.key, self.attempt, track.title);
        Some((self.attempt, track))
    }

    /// Starts a new attempt for the same current track (loop replay).
    pub fn replay(&mut self) -> Option<(u64, QueuedTrack)> {
        let track = self.current.clone()?;
        self.attempt += 1;
        Some((self.attempt, track))
    }

    /// Whether `attempt` is the attempt currently in flight.
    pub fn is_live(&self, attempt: u64) -> bool {
        self.status == SessionStatus::Playing && self.attempt == attempt
    }

    /// Drops the current track and returns to idle. The queue is untouched.
    pub fn finish(&mut self) -> Option<QueuedTrack> {
        self.attempt += 1;
        self.status = SessionStatus::Idle;
        self.current.take()
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.loop_enabled = !self.loop_enabled;
        self.loop_enabled
    }

    /// Clears everything that belongs to playback. Idempotent.
    pub fn clear(&mut self) {
        self.finish();
        self.queue.clear();
    }

    pub fn snapshot(&self, pending_enqueues: usize) -> SessionSnapshot {
        SessionSnapshot {
            key: self.key,
            target: self.target,
            language: self.language,
            status: self.status(),
            current: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            loop_enabled: self.loop_enabled,
            attempt: self.attempt,
            pending_enqueues,
        }
    }
}

/// Enqueue requests whose resolution is still running.
///
/// A slot is reserved when the request arrives, so results are committed in
/// arrival order even when resolutions finish out of order.
#[derive(Debug)]
pub struct PendingSlots<R, V> {
    next_ticket: u64,
    slots: BTreeMap<u64, (R, Option<V>)>,
}

impl<R, V> Default for PendingSlots<R, V> {
    fn default() -> Self {
        Self {
            next_ticket: 0,
            slots: BTreeMap::new(),
        }
    }
}

impl<R, V> PendingSlots<R, V> {
    pub fn reserve(&mut self, reply: R) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.slots.insert(ticket, (reply, None));
        ticket
    }

    /// Stores a result. Returns false for unknown (already cleared) tickets.
    pub fn fill(&mut self, ticket: u64, value: V) -> bool {
        match self.slots.get_mut(&ticket) {
            Some((_, slot)) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    /// Removes filled slots from the front, stopping at the first unfilled one.
    pub fn drain_ready(&mut self) -> Vec<(R, V)> {
        let mut ready = Vec::new();
        while let Some(entry) = self.slots.first_entry() {
            if entry.get().1.is_none() {
                break;
            }
            let (reply, value) = entry.remove();
            if let Some(value) = value {
                ready.push((reply, value));
            }
        }
        ready
    }

    /// Drops every slot, returning the reply handles in arrival order.
    pub fn clear(&mut self) -> Vec<R> {
        std::mem::take(&mut self.slots)
            .into_values()
            .map(|(reply, _)| reply)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

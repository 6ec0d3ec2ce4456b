//! Per-session event loop.
//!
//! Each session runs as one tokio task that owns its [`GuildSession`] and
//! processes [`SessionEvent`]s strictly in arrival order. Commands, resolver
//! results and transport completions all arrive as events, so every
//! check-then-mutate on session state happens without a suspension point in
//! between. Slow work (resolution) is spawned and reports back as an event.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{
    notify::{Notifier, SessionNotice},
    queue::{GuildSession, PendingSlots, QueuedTrack, SessionKey, SessionSnapshot},
    sink::{ActivePlayback, CompletionSignal, PlayOptions, PlaybackSink, VoiceConnection, VoiceTarget},
};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::{ResolvedStream, TrackMetadata, TrackResolver},
    storage::Language,
};

/// Collaborators shared by every session.
pub struct SessionContext {
    pub resolver: Arc<dyn TrackResolver>,
    pub sink: Arc<dyn PlaybackSink>,
    pub notifier: Arc<dyn Notifier>,
    pub options: PlayOptions,
    pub max_queue_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `/stop`
    Stopped,
    /// `/leave`
    Left,
    /// Idle and abandoned, torn down by the reaper.
    Reaped,
    /// The bot was removed from the voice channel from outside.
    Disconnected,
}

#[derive(Debug)]
pub enum SessionEvent {
    Enqueue {
        query: String,
        reply: oneshot::Sender<PlayerResult<usize>>,
    },
    Resolved {
        ticket: u64,
        result: PlayerResult<TrackMetadata>,
    },
    StartNext,
    StreamReady {
        attempt: u64,
        result: PlayerResult<ResolvedStream>,
    },
    Completed {
        attempt: u64,
    },
    Skip {
        reply: oneshot::Sender<PlayerResult<QueuedTrack>>,
    },
    ToggleLoop {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reason: StopReason,
        reply: oneshot::Sender<()>,
    },
    Reap {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// The session's event loop has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

/// Cheap handle used by the store to talk to a session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    target: VoiceTarget,
    generation: u64,
}

impl SessionHandle {
    pub fn target(&self) -> VoiceTarget {
        self.target
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    /// Sends a request and waits for the reply.
    ///
    /// `Closed` means the event was never processed, so the caller may retry
    /// against a fresh session.
    pub async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionEvent,
    ) -> Result<T, Closed> {
        let (tx, rx) = oneshot::channel();
        self.events.send(make(tx)).map_err(|_| Closed)?;
        rx.await.map_err(|_| Closed)
    }
}

type EnqueueReply = oneshot::Sender<PlayerResult<usize>>;

enum Flow {
    Continue,
    Exit,
}

struct SessionActor {
    state: GuildSession,
    pending: PendingSlots<EnqueueReply, PlayerResult<TrackMetadata>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    inbox: mpsc::UnboundedReceiver<SessionEvent>,
    ctx: Arc<SessionContext>,
    connection: Option<Box<dyn VoiceConnection>>,
    playback: Option<Box<dyn ActivePlayback>>,
    /// Emit `NowPlaying` on the next successful start. Cleared for loop replays.
    announce: bool,
    /// Transport failures since the last successful start or user enqueue.
    transport_failures: u32,
}

/// Starts the event loop for a new session.
pub fn spawn(
    target: VoiceTarget,
    language: Language,
    generation: u64,
    ctx: Arc<SessionContext>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let actor = SessionActor {
        state: GuildSession::new(target, language),
        pending: PendingSlots::default(),
        events: tx.clone(),
        inbox: rx,
        ctx,
        connection: None,
        playback: None,
        announce: false,
        transport_failures: 0,
    };
    tokio::spawn(actor.run());

    SessionHandle {
        events: tx,
        target,
        generation,
    }
}

impl SessionActor {
    async fn run(mut self) {
        let key = self.state.key();
        info!("🎧 Session opened for guild {}", key);

        while let Some(event) = self.inbox.recv().await {
            if let Flow::Exit = self.handle(event).await {
                break;
            }
        }

        info!("👋 Session closed for guild {}", key);
    }

    fn key(&self) -> SessionKey {
        self.state.key()
    }

    fn notify(&self, notice: SessionNotice) {
        self.ctx
            .notifier
            .notify(self.key(), self.state.language(), notice);
    }

    async fn handle(&mut self, event: SessionEvent) -> Flow {
        match event {
            SessionEvent::Enqueue { query, reply } => self.on_enqueue(query, reply),
            SessionEvent::Resolved { ticket, result } => self.on_resolved(ticket, result),
            SessionEvent::StartNext => self.start_next(),
            SessionEvent::StreamReady { attempt, result } => {
                self.on_stream_ready(attempt, result).await
            }
            SessionEvent::Completed { attempt } => self.on_completed(attempt),
            SessionEvent::Skip { reply } => {
                let _ = reply.send(self.skip());
            }
            SessionEvent::ToggleLoop { reply } => {
                let enabled = self.state.toggle_loop();
                info!("🔁 Loop {} in guild {}", if enabled { "on" } else { "off" }, self.key());
                self.notify(SessionNotice::LoopToggled { enabled });
                let _ = reply.send(enabled);
            }
            SessionEvent::Stop { reason, reply } => {
                self.teardown(reason).await;
                let _ = reply.send(());
                return Flow::Exit;
            }
            SessionEvent::Reap { reply } => {
                if self.state.is_idle() && self.pending.is_empty() {
                    self.teardown(StopReason::Reaped).await;
                    let _ = reply.send(true);
                    return Flow::Exit;
                }
                let _ = reply.send(false);
            }
            SessionEvent::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot(self.pending.len()));
            }
        }
        Flow::Continue
    }

    fn on_enqueue(&mut self, query: String, reply: EnqueueReply) {
        let max = self.ctx.max_queue_size;
        if self.state.queue_len() + self.pending.len() >= max {
            let _ = reply.send(Err(PlayerError::QueueFull { max }));
            return;
        }

        // The slot is taken now; the queue position follows arrival order
        // no matter when the resolution finishes.
        let ticket = self.pending.reserve(reply);
        let resolver = self.ctx.resolver.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = resolver.resolve(&query).await;
            let _ = events.send(SessionEvent::Resolved { ticket, result });
        });
    }

    fn on_resolved(&mut self, ticket: u64, result: PlayerResult<TrackMetadata>) {
        if !self.pending.fill(ticket, result) {
            debug!("Dropping resolution for cleared ticket {} in guild {}", ticket, self.key());
            return;
        }

        for (reply, result) in self.pending.drain_ready() {
            match result {
                Ok(metadata) => {
                    let track = QueuedTrack::from(metadata);
                    let position = self.state.push(track.clone());
                    info!(
                        "➕ Queued '{}' ({}) at #{} in guild {}",
                        track.title,
                        track.external_id,
                        position,
                        self.key()
                    );
                    self.notify(SessionNotice::TrackEnqueued {
                        title: track.title,
                        duration_seconds: track.duration_seconds,
                        position,
                    });
                    let _ = reply.send(Ok(position));

                    if self.state.is_idle() {
                        self.transport_failures = 0;
                        // Continuation, so the enqueue reply is not held up by playback startup.
                        let _ = self.events.send(SessionEvent::StartNext);
                    }
                }
                Err(e) => {
                    warn!("❌ Resolution failed in guild {}: {}", self.key(), e);
                    let _ = reply.send(Err(e));
                }
            }
        }
    }

    fn start_next(&mut self) {
        match self.state.begin_next() {
            Some((attempt, track)) => {
                self.announce = true;
                self.request_stream(attempt, track);
            }
            None if self.state.is_idle() => {
                debug!("📭 Queue empty, guild {} is idle", self.key());
            }
            None => {}
        }
    }

    /// Play-time resolution for `attempt`. The result comes back as `StreamReady`.
    fn request_stream(&self, attempt: u64, track: QueuedTrack) {
        let resolver = self.ctx.resolver.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = resolver.resolve_stream(&track.canonical_url).await;
            let _ = events.send(SessionEvent::StreamReady { attempt, result });
        });
    }

    async fn on_stream_ready(&mut self, attempt: u64, result: PlayerResult<ResolvedStream>) {
        if !self.state.is_live(attempt) {
            debug!("Stale stream for attempt {} in guild {}", attempt, self.key());
            return;
        }

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                let title = self.state.current().map(|t| t.title.clone()).unwrap_or_default();
                warn!("⚠️ Skipping '{}' in guild {}: {}", title, self.key(), e);
                self.state.finish();
                self.start_next();
                return;
            }
        };

        if let Err(e) = self.play(attempt, &stream).await {
            self.on_transport_error(e).await;
            return;
        }
        self.transport_failures = 0;

        if std::mem::take(&mut self.announce) {
            if let Some(track) = self.state.current() {
                info!("🎵 Now playing '{}' in guild {}", track.title, self.key());
                let duration_seconds = match track.duration_seconds {
                    0 => stream.duration_seconds,
                    known => known,
                };
                self.notify(SessionNotice::NowPlaying {
                    title: track.title.clone(),
                    duration_seconds,
                    url: track.canonical_url.clone(),
                });
            }
        }
    }

    /// Drops the in-flight track and advances once. If the next start fails
    /// too, that track goes back to the queue head and the session waits idle
    /// for the next enqueue.
    async fn on_transport_error(&mut self, e: PlayerError) {
        let failed = self.state.finish();
        self.playback = None;
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
        self.transport_failures += 1;

        if self.transport_failures > 1 {
            warn!("⚠️ Voice still unavailable in guild {}, waiting: {}", self.key(), e);
            if let Some(track) = failed {
                self.state.requeue_front(track);
            }
            return;
        }

        let title = failed.map(|t| t.title).unwrap_or_default();
        error!("❌ Playback of '{}' failed in guild {}: {}", title, self.key(), e);
        self.notify(SessionNotice::PlaybackFailed {
            title,
            reason: e.to_string(),
        });
        let _ = self.events.send(SessionEvent::StartNext);
    }

    async fn play(&mut self, attempt: u64, stream: &ResolvedStream) -> PlayerResult<()> {
        if self.connection.is_none() {
            let connection = self.ctx.sink.connect(self.state.target()).await?;
            self.connection = Some(connection);
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(PlayerError::Transport("no voice connection".to_string()));
        };

        let signal = CompletionSignal::new(self.events.clone(), attempt);
        let playback = connection.play(stream, self.ctx.options, signal).await?;
        self.playback = Some(playback);
        Ok(())
    }

    fn on_completed(&mut self, attempt: u64) {
        if !self.state.is_live(attempt) {
            debug!("Stale completion for attempt {} in guild {}", attempt, self.key());
            return;
        }
        self.playback = None;

        if self.state.loop_enabled() {
            if let Some((next_attempt, track)) = self.state.replay() {
                debug!("🔂 Replaying '{}' in guild {}", track.title, self.key());
                self.request_stream(next_attempt, track);
            }
            return;
        }

        self.state.finish();
        self.start_next();
    }

    fn skip(&mut self) -> PlayerResult<QueuedTrack> {
        if self.state.is_idle() {
            return Err(PlayerError::NothingPlaying);
        }

        if let Some(playback) = self.playback.take() {
            playback.stop();
        }
        // Advancing bumps the attempt, so the completion fired by `stop` is
        // dropped as stale and loop mode cannot replay the skipped track.
        let skipped = self.state.finish().ok_or(PlayerError::NothingPlaying)?;
        info!("⏭️ Skipped '{}' in guild {}", skipped.title, self.key());
        self.start_next();
        Ok(skipped)
    }

    async fn teardown(&mut self, reason: StopReason) {
        if let Some(playback) = self.playback.take() {
            playback.stop();
        }
        self.state.clear();
        for reply in self.pending.clear() {
            let _ = reply.send(Err(PlayerError::SessionClosed));
        }
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
        // From here on senders see the session as closed; anything still
        // buffered is dropped unprocessed and its caller may retry.
        self.inbox.close();

        info!("⏹️ Session for guild {} torn down ({:?})", self.key(), reason);
        if reason == StopReason::Left {
            self.notify(SessionNotice::SessionLeft);
        }
    }
}

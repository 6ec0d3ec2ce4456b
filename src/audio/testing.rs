//! In-crate fakes for exercising sessions without Discord or yt-dlp.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{
    notify::{Notifier, SessionNotice},
    player::QueueOrchestrator,
    queue::{SessionKey, SessionSnapshot},
    reaper::ListenerProbe,
    session::SessionContext,
    sink::{ActivePlayback, CompletionSignal, PlayOptions, PlaybackSink, VoiceConnection, VoiceTarget},
};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::{ResolvedStream, TrackMetadata, TrackResolver},
    storage::{Language, LanguageStore, MockLanguageStore},
};

pub const GUILD: u64 = 1;
pub const KEY: SessionKey = SessionKey(GUILD);

pub fn target() -> VoiceTarget {
    VoiceTarget {
        guild_id: GUILD,
        channel_id: 10,
    }
}

pub fn url_for(title: &str) -> String {
    format!("https://tracks.test/{title}")
}

#[derive(Clone)]
struct Script {
    duration_seconds: u64,
    resolve_delay: Duration,
    stream_delay: Duration,
    stream_fails: bool,
}

/// Resolver with per-query latency and failures. Unknown queries yield no results.
#[derive(Default)]
pub struct FakeResolver {
    scripts: Mutex<HashMap<String, Script>>,
    resolve_calls: AtomicUsize,
    stream_calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    fn script(&self, title: &str, script: Script) {
        self.scripts.lock().insert(title.to_string(), script);
    }

    pub fn track(&self, title: &str, duration_seconds: u64) {
        self.script(
            title,
            Script {
                duration_seconds,
                resolve_delay: Duration::ZERO,
                stream_delay: Duration::ZERO,
                stream_fails: false,
            },
        );
    }

    pub fn slow_track(&self, title: &str, resolve_delay: Duration) {
        self.script(
            title,
            Script {
                duration_seconds: 60,
                resolve_delay,
                stream_delay: Duration::ZERO,
                stream_fails: false,
            },
        );
    }

    pub fn slow_stream(&self, title: &str, stream_delay: Duration) {
        self.script(
            title,
            Script {
                duration_seconds: 60,
                resolve_delay: Duration::ZERO,
                stream_delay,
                stream_fails: false,
            },
        );
    }

    pub fn broken_stream(&self, title: &str) {
        self.script(
            title,
            Script {
                duration_seconds: 60,
                resolve_delay: Duration::ZERO,
                stream_delay: Duration::ZERO,
                stream_fails: true,
            },
        );
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Play-time resolutions issued for `title`.
    pub fn stream_calls(&self, title: &str) -> usize {
        let url = url_for(title);
        self.stream_calls.lock().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, query: &str) -> PlayerResult<TrackMetadata> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().get(query).cloned();
        let script = script.ok_or_else(|| PlayerError::Resolution("no results".to_string()))?;
        tokio::time::sleep(script.resolve_delay).await;

        Ok(TrackMetadata {
            external_id: query.to_string(),
            canonical_url: url_for(query),
            title: query.to_string(),
            duration_seconds: script.duration_seconds,
        })
    }

    async fn resolve_stream(&self, canonical_url: &str) -> PlayerResult<ResolvedStream> {
        let calls = {
            let mut calls = self.stream_calls.lock();
            calls.push(canonical_url.to_string());
            calls.len()
        };
        let title = canonical_url.trim_start_matches("https://tracks.test/").to_string();
        let script = self.scripts.lock().get(&title).cloned();
        let script = script.ok_or_else(|| PlayerError::StreamRefresh("gone".to_string()))?;
        tokio::time::sleep(script.stream_delay).await;

        if script.stream_fails {
            return Err(PlayerError::StreamRefresh("signature expired".to_string()));
        }
        Ok(ResolvedStream {
            stream_url: format!("{canonical_url}?stream={calls}"),
            title,
            duration_seconds: script.duration_seconds,
        })
    }
}

type Slot = Arc<Mutex<Option<CompletionSignal>>>;

/// Sink that records plays. Stopping a playback fires its completion,
/// the way a real transport reports a stopped track.
#[derive(Default)]
pub struct FakeSink {
    fail_connect: AtomicBool,
    failing_connects: AtomicUsize,
    connects: AtomicUsize,
    disconnects: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    plays: Arc<Mutex<Vec<(String, Slot)>>>,
}

impl FakeSink {
    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Fails only the next `count` connects.
    pub fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn played(&self) -> Vec<String> {
        self.plays.lock().iter().map(|(title, _)| title.clone()).collect()
    }

    /// Ends the most recent playback as if the track ran out.
    pub fn finish_latest(&self) -> bool {
        let slot = self.plays.lock().last().map(|(_, slot)| slot.clone());
        let signal = slot.and_then(|slot| slot.lock().take());
        match signal {
            Some(signal) => {
                signal.complete();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PlaybackSink for FakeSink {
    async fn connect(&self, _target: VoiceTarget) -> PlayerResult<Box<dyn VoiceConnection>> {
        let one_off = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if one_off || self.fail_connect.load(Ordering::SeqCst) {
            return Err(PlayerError::Transport("voice handshake timed out".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            plays: self.plays.clone(),
            stops: self.stops.clone(),
            disconnects: self.disconnects.clone(),
        }))
    }
}

struct FakeConnection {
    plays: Arc<Mutex<Vec<(String, Slot)>>>,
    stops: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(
        &mut self,
        stream: &ResolvedStream,
        _options: PlayOptions,
        on_end: CompletionSignal,
    ) -> PlayerResult<Box<dyn ActivePlayback>> {
        let slot = Arc::new(Mutex::new(Some(on_end)));
        self.plays.lock().push((stream.title.clone(), slot.clone()));
        Ok(Box::new(FakePlayback {
            slot,
            stops: self.stops.clone(),
        }))
    }

    async fn disconnect(&mut self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakePlayback {
    slot: Slot,
    stops: Arc<AtomicUsize>,
}

impl ActivePlayback for FakePlayback {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let signal = self.slot.lock().take();
        if let Some(signal) = signal {
            signal.complete();
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(SessionKey, Language, SessionNotice)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<SessionNotice> {
        self.notices.lock().iter().map(|(_, _, n)| n.clone()).collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                SessionNotice::PlaybackFailed { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }

    pub fn now_playing(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                SessionNotice::NowPlaying { title, .. } => Some(title),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, key: SessionKey, language: Language, notice: SessionNotice) {
        self.notices.lock().push((key, language, notice));
    }
}

/// Listener count shared by every channel.
#[derive(Default)]
pub struct FixedProbe {
    listeners: Mutex<Option<usize>>,
}

impl FixedProbe {
    pub fn set(&self, listeners: Option<usize>) {
        *self.listeners.lock() = listeners;
    }
}

impl ListenerProbe for FixedProbe {
    fn listeners(&self, _target: VoiceTarget) -> Option<usize> {
        *self.listeners.lock()
    }
}

pub fn english() -> MockLanguageStore {
    let mut languages = MockLanguageStore::new();
    languages.expect_language().returning(|_| Language::En);
    languages
}

pub struct Harness {
    pub orchestrator: Arc<QueueOrchestrator>,
    pub resolver: Arc<FakeResolver>,
    pub sink: Arc<FakeSink>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(1000, english())
    }

    pub fn build(max_queue_size: usize, languages: impl LanguageStore + 'static) -> Self {
        let resolver = Arc::new(FakeResolver::default());
        let sink = Arc::new(FakeSink::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let ctx = SessionContext {
            resolver: resolver.clone(),
            sink: sink.clone(),
            notifier: notifier.clone(),
            options: PlayOptions::default(),
            max_queue_size,
        };
        let orchestrator = Arc::new(QueueOrchestrator::new(ctx, Arc::new(languages)));

        Self {
            orchestrator,
            resolver,
            sink,
            notifier,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.orchestrator
            .snapshot(KEY)
            .await
            .expect("session should exist")
    }

    /// Polls the session until `done` holds, panicking after two seconds.
    pub async fn wait_for(&self, done: impl Fn(&SessionSnapshot) -> bool) -> SessionSnapshot {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let snapshot = self.snapshot().await;
            if done(&snapshot) {
                return snapshot;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("condition not reached, last state: {snapshot:?}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Waits until the sink has been handed `count` tracks in total.
    pub async fn wait_plays(&self, count: usize) -> SessionSnapshot {
        let sink = self.sink.clone();
        self.wait_for(move |_| sink.played().len() >= count).await
    }

    /// Waits until nothing can change on its own anymore.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
}

pub fn titles(tracks: &[&str]) -> Vec<String> {
    tracks.iter().map(|t| t.to_string()).collect()
}

use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::debug;

use super::{
    queue::SessionKey,
    session::{self, SessionContext, SessionHandle},
    sink::VoiceTarget,
};
use crate::storage::LanguageStore;

/// Owner of every live session, keyed by guild.
///
/// One map entry per session replaces the parallel queue/status/loop maps a
/// bot would otherwise keep; all per-session fields live inside the session task.
pub struct SessionStore {
    sessions: DashMap<SessionKey, SessionHandle>,
    ctx: Arc<SessionContext>,
    languages: Arc<dyn LanguageStore>,
    generations: AtomicU64,
}

impl SessionStore {
    pub fn new(ctx: Arc<SessionContext>, languages: Arc<dyn LanguageStore>) -> Self {
        Self {
            sessions: DashMap::new(),
            ctx,
            languages,
            generations: AtomicU64::new(0),
        }
    }

    /// Returns the live session for `target`'s guild, creating it if needed.
    ///
    /// The language preference is read once, here.
    pub fn get_or_create(&self, target: VoiceTarget) -> SessionHandle {
        let key = SessionKey::from(target);
        let mut entry = self.sessions.entry(key).or_insert_with(|| self.open(target));

        if entry.is_closed() {
            debug!("Replacing closed session for guild {}", key);
            *entry = self.open(target);
        }
        entry.clone()
    }

    pub fn get(&self, key: SessionKey) -> Option<SessionHandle> {
        self.sessions
            .get(&key)
            .map(|entry| entry.value().clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Removes the entry only if it still belongs to the given generation,
    /// so a session created after a teardown is never dropped by mistake.
    pub fn remove(&self, key: SessionKey, generation: u64) -> bool {
        self.sessions
            .remove_if(&key, |_, handle| handle.generation() == generation)
            .is_some()
    }

    pub fn entries(&self) -> Vec<(SessionKey, SessionHandle)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn open(&self, target: VoiceTarget) -> SessionHandle {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let language = self.languages.language(target.guild_id);
        session::spawn(target, language, generation, self.ctx.clone())
    }
}

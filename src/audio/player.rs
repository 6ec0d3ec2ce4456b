use std::sync::Arc;
use tracing::{debug, info};

use super::{
    queue::{QueuedTrack, SessionKey, SessionSnapshot},
    session::{SessionContext, SessionEvent, StopReason},
    sink::VoiceTarget,
    store::SessionStore,
};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::guard,
    storage::LanguageStore,
};

/// Entry point for the UI layer: one method per user command.
///
/// Every call is turned into an event on the target session's loop, so
/// commands for one guild are applied in the order they arrive while
/// different guilds never wait on each other.
pub struct QueueOrchestrator {
    store: SessionStore,
}

impl QueueOrchestrator {
    pub fn new(ctx: SessionContext, languages: Arc<dyn LanguageStore>) -> Self {
        Self {
            store: SessionStore::new(Arc::new(ctx), languages),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resolves `query` and appends it to the session queue, creating the
    /// session on first use. Returns the 1-based queue position.
    ///
    /// Playback starts on its own if the session was idle; this call does not
    /// wait for it.
    pub async fn enqueue(&self, target: VoiceTarget, query: &str) -> PlayerResult<usize> {
        // Denylisted links never reach the resolver.
        guard::check_query(query)?;

        // A session may close between lookup and send; retry once on a fresh one.
        for _ in 0..2 {
            let handle = self.store.get_or_create(target);
            let query = query.to_string();
            match handle
                .request(|reply| SessionEvent::Enqueue { query, reply })
                .await
            {
                Ok(result) => return result,
                Err(_) => {
                    debug!("Session for guild {} closed during enqueue, retrying", target.guild_id);
                    self.store.remove(SessionKey::from(target), handle.generation());
                }
            }
        }
        Err(PlayerError::SessionClosed)
    }

    /// Stops the current track and advances, ignoring loop mode.
    pub async fn skip(&self, key: SessionKey) -> PlayerResult<QueuedTrack> {
        let handle = self.store.get(key).ok_or(PlayerError::NothingPlaying)?;
        handle
            .request(|reply| SessionEvent::Skip { reply })
            .await
            .map_err(|_| PlayerError::NothingPlaying)?
    }

    pub async fn toggle_loop(&self, key: SessionKey) -> PlayerResult<bool> {
        let handle = self.store.get(key).ok_or(PlayerError::NoSession)?;
        handle
            .request(|reply| SessionEvent::ToggleLoop { reply })
            .await
            .map_err(|_| PlayerError::NoSession)
    }

    /// Stops playback, clears the queue and releases the voice connection.
    /// Returns whether a session existed. Idempotent.
    pub async fn stop(&self, key: SessionKey) -> bool {
        self.shutdown(key, StopReason::Stopped).await
    }

    /// Same as [`Self::stop`] but announces that the bot left.
    pub async fn leave(&self, key: SessionKey) -> bool {
        self.shutdown(key, StopReason::Left).await
    }

    /// Cleans up after the bot was disconnected from voice by someone else.
    pub async fn disconnected(&self, key: SessionKey) -> bool {
        self.shutdown(key, StopReason::Disconnected).await
    }

    /// Tears the session down only if it is idle. Returns whether it was reaped.
    pub async fn reap(&self, key: SessionKey) -> bool {
        let Some(handle) = self.store.get(key) else {
            return false;
        };
        let reaped = handle
            .request(|reply| SessionEvent::Reap { reply })
            .await
            .unwrap_or(false);
        if reaped {
            self.store.remove(key, handle.generation());
        }
        reaped
    }

    pub async fn snapshot(&self, key: SessionKey) -> Option<SessionSnapshot> {
        let handle = self.store.get(key)?;
        handle
            .request(|reply| SessionEvent::Snapshot { reply })
            .await
            .ok()
    }

    async fn shutdown(&self, key: SessionKey, reason: StopReason) -> bool {
        let Some(handle) = self.store.get(key) else {
            return false;
        };
        // Remove only after the session finished releasing its connection,
        // so a new session for the guild cannot race the old disconnect.
        let _ = handle
            .request(|reply| SessionEvent::Stop { reason, reply })
            .await;
        self.store.remove(key, handle.generation());
        info!("🛑 Session for guild {} removed ({:?})", key, reason);
        true
    }
}

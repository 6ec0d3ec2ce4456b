use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{player::QueueOrchestrator, sink::VoiceTarget};

/// Counts the listeners in a voice channel, bots excluded.
pub trait ListenerProbe: Send + Sync {
    /// `None` when the channel is unknown (deleted, guild unavailable),
    /// which is treated as empty.
    fn listeners(&self, target: VoiceTarget) -> Option<usize>;
}

/// Periodically tears down sessions that are idle in an empty channel.
///
/// A session that is playing is never reaped, even with nobody listening:
/// only the session itself decides, inside its own event loop, whether it
/// is idle at the moment the reap request is processed.
pub struct InactivityReaper {
    orchestrator: Arc<QueueOrchestrator>,
    probe: Arc<dyn ListenerProbe>,
    period: Duration,
}

impl InactivityReaper {
    pub fn new(
        orchestrator: Arc<QueueOrchestrator>,
        probe: Arc<dyn ListenerProbe>,
        period: Duration,
    ) -> Self {
        Self {
            orchestrator,
            probe,
            period,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!("🧹 Inactivity reaper running every {}", humantime::format_duration(self.period));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
        debug!("Inactivity reaper stopped");
    }

    /// One pass over all sessions. Returns how many were reaped.
    pub async fn sweep(&self) -> usize {
        let store = self.orchestrator.store();
        if store.is_empty() {
            return 0;
        }

        let candidates: Vec<_> = store
            .entries()
            .into_iter()
            .filter(|(_, handle)| self.probe.listeners(handle.target()).unwrap_or(0) == 0)
            .map(|(key, _)| key)
            .collect();

        if candidates.is_empty() {
            return 0;
        }

        let results = join_all(candidates.iter().map(|key| self.orchestrator.reap(*key))).await;
        let reaped = results.into_iter().filter(|reaped| *reaped).count();
        if reaped > 0 {
            info!("🧹 Reaped {} idle session(s), {} still active", reaped, store.len());
        }
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        notify::SessionNotice,
        queue::SessionStatus,
        testing::{target, FixedProbe, Harness, KEY},
    };
    use pretty_assertions::assert_eq;

    fn reaper(h: &Harness, listeners: Option<usize>) -> InactivityReaper {
        let probe = Arc::new(FixedProbe::default());
        probe.set(listeners);
        InactivityReaper::new(h.orchestrator.clone(), probe, Duration::from_secs(60))
    }

    async fn idle_session(h: &Harness) {
        h.resolver.track("A", 120);
        h.orchestrator.enqueue(target(), "A").await.unwrap();
        h.wait_plays(1).await;
        h.sink.finish_latest();
        h.wait_for(|s| s.status == SessionStatus::Idle).await;
    }

    #[tokio::test]
    async fn test_playing_session_is_kept_in_empty_channel() {
        let h = Harness::new();
        h.resolver.track("A", 120);
        h.orchestrator.enqueue(target(), "A").await.unwrap();
        h.wait_plays(1).await;

        assert_eq!(reaper(&h, Some(0)).sweep().await, 0);
        assert_eq!(h.snapshot().await.status, SessionStatus::Playing);
        assert_eq!(h.sink.disconnects(), 0);
    }

    #[tokio::test]
    async fn test_idle_session_in_empty_channel_is_reaped() {
        let h = Harness::new();
        idle_session(&h).await;

        assert_eq!(reaper(&h, Some(0)).sweep().await, 1);
        assert!(h.orchestrator.store().is_empty());
        assert_eq!(h.orchestrator.snapshot(KEY).await, None);
        assert_eq!(h.sink.disconnects(), 1);
        assert!(!h.notifier.notices().contains(&SessionNotice::SessionLeft));
    }

    #[tokio::test]
    async fn test_idle_session_with_listeners_is_kept() {
        let h = Harness::new();
        idle_session(&h).await;

        assert_eq!(reaper(&h, Some(3)).sweep().await, 0);
        assert_eq!(h.orchestrator.store().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_channel_counts_as_empty() {
        let h = Harness::new();
        idle_session(&h).await;

        assert_eq!(reaper(&h, None).sweep().await, 1);
        assert!(h.orchestrator.store().is_empty());
    }

    #[tokio::test]
    async fn test_session_with_resolving_enqueue_is_kept() {
        let h = Harness::new();
        h.resolver.slow_track("A", Duration::from_millis(80));

        let orchestrator = h.orchestrator.clone();
        let pending = tokio::spawn(async move { orchestrator.enqueue(target(), "A").await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.snapshot().await.status, SessionStatus::Idle);

        assert_eq!(reaper(&h, Some(0)).sweep().await, 0);
        assert_eq!(pending.await.unwrap(), Ok(1));
        assert_eq!(h.orchestrator.store().len(), 1);
        h.wait_plays(1).await;
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = Harness::new();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(reaper(&h, Some(0)).run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reaper should stop")
            .unwrap();
    }
}

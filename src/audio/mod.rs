//! # Audio Module
//!
//! Session playback state machine and queue orchestration.
//!
//! ## Architecture
//!
//! ### [`player`] - Queue Orchestrator
//! - One method per user command (enqueue, skip, stop, leave, loop)
//! - Routes every command to the owning session as an event
//!
//! ### [`session`] - Session Event Loop
//! - One tokio task per guild, owning that guild's [`queue::GuildSession`]
//! - Serializes commands, resolver results and track-end signals
//! - Drops completions from superseded play attempts
//!
//! ### [`store`] - Session Store
//! - Get-or-create / remove by guild key
//!
//! ### [`reaper`] - Inactivity Reaper
//! - Periodic sweep that tears down idle sessions in empty channels
//!
//! ### [`sink`] / [`songbird_sink`] - Playback Transport
//! - Contract for voice connections and in-flight tracks
//! - songbird implementation with exactly-once completion
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let orchestrator = QueueOrchestrator::new(ctx, languages);
//! let target = VoiceTarget { guild_id: 1, channel_id: 2 };
//!
//! let position = orchestrator.enqueue(target, "lofi hip hop").await?;
//! orchestrator.toggle_loop(SessionKey(1)).await?;
//! orchestrator.skip(SessionKey(1)).await?;
//! orchestrator.leave(SessionKey(1)).await;
//! ```

pub mod notify;
pub mod player;
pub mod queue;
pub mod reaper;
pub mod session;
pub mod sink;
pub mod songbird_sink;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use notify::{Notifier, SessionNotice};
pub use player::QueueOrchestrator;
pub use queue::{SessionKey, SessionSnapshot, SessionStatus};
pub use reaper::{InactivityReaper, ListenerProbe};
pub use session::SessionContext;
pub use sink::{PlayOptions, VoiceTarget};
pub use songbird_sink::SongbirdSink;

//! # Sources
//!
//! Track resolution contract used by the playback core.
//!
//! Resolution is split in two phases:
//! - **queue-time**: [`TrackResolver::resolve`] turns a query or URL into
//!   immutable metadata stored in the session queue.
//! - **play-time**: [`TrackResolver::resolve_stream`] fetches a fresh,
//!   short-lived stream URL right before each play attempt. Stream URLs are
//!   never cached beyond one attempt.

pub mod guard;
pub mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlayerResult;

pub use ytdlp::YtDlpResolver;

/// Metadata returned by queue-time resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub external_id: String,
    pub canonical_url: String,
    pub title: String,
    /// Whole seconds, 0 when unknown.
    pub duration_seconds: u64,
}

/// Result of play-time resolution. Only valid for a single play attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub stream_url: String,
    pub title: String,
    pub duration_seconds: u64,
}

#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resolves a raw URL or a free-text query into playable metadata.
    ///
    /// Must reject disallowed link patterns before any network access.
    async fn resolve(&self, query: &str) -> PlayerResult<TrackMetadata>;

    /// Fetches a fresh ephemeral stream URL for a previously resolved track.
    async fn resolve_stream(&self, canonical_url: &str) -> PlayerResult<ResolvedStream>;
}

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::{process::Command, sync::Semaphore};
use tracing::{debug, info, warn};

use super::{guard, ResolvedStream, TrackMetadata, TrackResolver};
use crate::error::{PlayerError, PlayerResult};

/// Resolver backed by the `yt-dlp` binary.
///
/// Every call spawns one `yt-dlp` process. The semaphore is the resolver
/// worker pool: it bounds how many run at once across all sessions.
pub struct YtDlpResolver {
    binary: PathBuf,
    cookies: Option<PathBuf>,
    permits: Semaphore,
}

/// Fields read from `yt-dlp --dump-json`.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    url: Option<String>,
    entries: Option<Vec<YtDlpInfo>>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<PathBuf>, cookies: Option<PathBuf>, concurrency: usize) -> Self {
        Self {
            binary: binary.into(),
            cookies,
            permits: Semaphore::new(concurrency.max(1)),
        }
    }

    /// Checks that the binary is runnable. Used at startup.
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.binary).arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("{} --version failed", self.binary.display());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn dump_json(&self, target: &str) -> PlayerResult<YtDlpInfo> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PlayerError::Resolution("resolver shut down".to_string()))?;

        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--dump-json",
            "--no-playlist",
            "--no-warnings",
            "--format",
            "bestaudio/best",
            "--default-search",
            "ytsearch",
        ]);
        if let Some(cookies) = &self.cookies {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(target).kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .map_err(|e| PlayerError::Resolution(format!("could not run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::Resolution(first_error_line(&stderr)));
        }

        parse_info(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> PlayerResult<TrackMetadata> {
        guard::check_query(query)?;

        let query = query.trim();
        let target = if guard::is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{query}")
        };

        info!("🔍 Resolving: {}", target);
        let info = self.dump_json(&target).await?;
        let metadata = to_metadata(info)?;
        debug!("Resolved {} -> {}", target, metadata.canonical_url);
        Ok(metadata)
    }

    async fn resolve_stream(&self, canonical_url: &str) -> PlayerResult<ResolvedStream> {
        debug!("🎵 Refreshing stream URL for {}", canonical_url);
        let info = self
            .dump_json(canonical_url)
            .await
            .map_err(|e| PlayerError::StreamRefresh(e.to_string()))?;
        to_stream(info)
    }
}

/// Parses the JSON printed by `--dump-json`. Search results wrap the hit in `entries`.
fn parse_info(stdout: &str) -> PlayerResult<YtDlpInfo> {
    let line = stdout
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| PlayerError::Resolution("no results".to_string()))?;

    let info: YtDlpInfo = serde_json::from_str(line)
        .map_err(|e| PlayerError::Resolution(format!("unreadable yt-dlp output: {e}")))?;

    match info.entries {
        Some(entries) => entries
            .into_iter()
            .next()
            .ok_or_else(|| PlayerError::Resolution("no results".to_string())),
        None => Ok(info),
    }
}

fn to_metadata(info: YtDlpInfo) -> PlayerResult<TrackMetadata> {
    let external_id = info
        .id
        .ok_or_else(|| PlayerError::Resolution("missing id".to_string()))?;
    let canonical_url = info
        .webpage_url
        .ok_or_else(|| PlayerError::Resolution("missing webpage_url".to_string()))?;

    Ok(TrackMetadata {
        external_id,
        canonical_url,
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        duration_seconds: whole_seconds(info.duration),
    })
}

fn to_stream(info: YtDlpInfo) -> PlayerResult<ResolvedStream> {
    let stream_url = info
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| PlayerError::StreamRefresh("no stream url".to_string()))?;

    Ok(ResolvedStream {
        stream_url,
        title: info.title.unwrap_or_else(|| "Unknown".to_string()),
        duration_seconds: whole_seconds(info.duration),
    })
}

fn whole_seconds(duration: Option<f64>) -> u64 {
    match duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => secs as u64,
        _ => 0,
    }
}

/// yt-dlp prints `ERROR: ...` lines; keep the first one for the user.
fn first_error_line(stderr: &str) -> String {
    let line = stderr
        .lines()
        .find(|line| line.starts_with("ERROR"))
        .or_else(|| stderr.lines().next())
        .unwrap_or("yt-dlp failed");

    if line.contains("Private video") || line.contains("Video unavailable") {
        warn!("Source unavailable: {}", line);
    }
    line.trim_start_matches("ERROR:").trim().to_string()
}

use anyhow::Context as _;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::all::{ChannelId, GuildId};
use songbird::{
    input::{ChildContainer, HttpRequest, Input},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    path::PathBuf,
    process::{Command, Stdio},
    sync::Arc,
};
use tracing::{debug, error, info, warn};

use super::sink::{ActivePlayback, CompletionSignal, PlayOptions, PlaybackSink, VoiceConnection, VoiceTarget};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::ResolvedStream,
};

/// EBU R128 target: -16 LUFS integrated, -1.5 dBTP peak, 11 LU range.
const LOUDNORM_FILTER: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// Playback transport backed by songbird.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    ffmpeg: Arc<PathBuf>,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            ffmpeg: Arc::new(ffmpeg.into()),
        }
    }

    /// Checks that ffmpeg runs and returns its version.
    pub async fn verify_ffmpeg(&self) -> anyhow::Result<String> {
        let output = tokio::process::Command::new(self.ffmpeg.as_path())
            .arg("-version")
            .output()
            .await
            .with_context(|| format!("could not run {}", self.ffmpeg.display()))?;

        if !output.status.success() {
            anyhow::bail!("{} -version exited with {}", self.ffmpeg.display(), output.status);
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        Ok(banner
            .split_whitespace()
            .nth(2)
            .unwrap_or("unknown")
            .to_string())
    }
}

/// ffmpeg arguments that fetch `stream_url`, normalize loudness and write
/// 48 kHz stereo WAV to stdout.
fn normalized_args(stream_url: &str) -> Vec<&str> {
    vec![
        "-hide_banner",
        "-loglevel",
        "error",
        "-reconnect",
        "1",
        "-reconnect_streamed",
        "1",
        "-reconnect_delay_max",
        "5",
        "-i",
        stream_url,
        "-vn",
        "-af",
        LOUDNORM_FILTER,
        "-c:a",
        "pcm_s16le",
        "-f",
        "wav",
        "-ar",
        "48000",
        "-ac",
        "2",
        "pipe:1",
    ]
}

#[async_trait]
impl PlaybackSink for SongbirdSink {
    async fn connect(&self, target: VoiceTarget) -> PlayerResult<Box<dyn VoiceConnection>> {
        let guild_id = GuildId::new(target.guild_id);
        let channel_id = ChannelId::new(target.channel_id);

        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error joining voice channel {} in guild {}: {:?}", channel_id, guild_id, e);
            PlayerError::Transport(format!("could not join voice channel: {e}"))
        })?;

        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);
        Ok(Box::new(SongbirdConnection {
            manager: self.manager.clone(),
            guild_id,
            call,
            http: self.http.clone(),
            ffmpeg: self.ffmpeg.clone(),
        }))
    }
}

struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    ffmpeg: Arc<PathBuf>,
}

impl SongbirdConnection {
    fn input(&self, stream: &ResolvedStream, options: PlayOptions) -> PlayerResult<Input> {
        if !options.normalize {
            return Ok(HttpRequest::new(self.http.clone(), stream.stream_url.clone()).into());
        }

        let child = Command::new(self.ffmpeg.as_path())
            .args(normalized_args(&stream.stream_url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                error!("Error spawning {}: {:?}", self.ffmpeg.display(), e);
                PlayerError::Transport(format!("could not start ffmpeg: {e}"))
            })?;
        Ok(ChildContainer::from(child).into())
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(
        &mut self,
        stream: &ResolvedStream,
        options: PlayOptions,
        on_end: CompletionSignal,
    ) -> PlayerResult<Box<dyn ActivePlayback>> {
        let input = self.input(stream, options)?;
        let handle = self.call.lock().await.play_input(input);

        // End and Error share one slot so the session hears about the track once.
        let slot = Arc::new(Mutex::new(Some(on_end)));
        let registered = handle
            .set_volume(options.volume)
            .and_then(|_| {
                handle.add_event(
                    Event::Track(TrackEvent::End),
                    TrackEndNotifier { slot: slot.clone() },
                )
            })
            .and_then(|_| {
                handle.add_event(
                    Event::Track(TrackEvent::Error),
                    TrackEndNotifier { slot: slot.clone() },
                )
            });

        if let Err(e) = registered {
            let _ = handle.stop();
            return Err(PlayerError::Transport(format!("could not control track: {e}")));
        }

        debug!("▶️ Track started in guild {}", self.guild_id);
        Ok(Box::new(SongbirdPlayback { handle }))
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Error leaving voice in guild {}: {:?}", self.guild_id, e);
        } else {
            info!("👋 Disconnected from voice in guild {}", self.guild_id);
        }
    }
}

struct SongbirdPlayback {
    handle: TrackHandle,
}

impl ActivePlayback for SongbirdPlayback {
    fn stop(&self) {
        // Fails only if the track already finished.
        let _ = self.handle.stop();
    }
}

/// Fires the completion signal the first time the track ends or errors.
struct TrackEndNotifier {
    slot: Arc<Mutex<Option<CompletionSignal>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in *tracks {
                debug!("Track finished with state {:?}", state.playing);
            }
        }

        let signal = self.slot.lock().take();
        if let Some(signal) = signal {
            debug!("Completing play attempt {}", signal.attempt());
            signal.complete();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalized_args_read_url_and_apply_loudnorm() {
        let args = normalized_args("https://cdn.test/audio?sig=1");

        let input = args.iter().position(|a| *a == "-i").unwrap();
        assert_eq!(args[input + 1], "https://cdn.test/audio?sig=1");
        let filter = args.iter().position(|a| *a == "-af").unwrap();
        assert_eq!(args[filter + 1], "loudnorm=I=-16:TP=-1.5:LRA=11");
        // Reconnect flags are input options and must precede -i.
        assert!(args.iter().position(|a| *a == "-reconnect").unwrap() < input);
        assert_eq!(args.last(), Some(&"pipe:1"));
    }
}

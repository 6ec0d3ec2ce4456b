use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use super::messages::Text;
use crate::{
    audio::{queue::QueuedTrack, SessionNotice, SessionSnapshot, SessionStatus},
    error::PlayerError,
    storage::Language,
};

/// Standard bot palette.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 GuildTune";

/// Queue entries listed before the remainder is summarized.
const QUEUE_PREVIEW: usize = 10;

/// Embed posted to the guild's text channel for a session notice.
pub fn notice_embed(language: Language, notice: &SessionNotice) -> CreateEmbed {
    let text = Text::new(language);

    match notice {
        SessionNotice::TrackEnqueued {
            title,
            duration_seconds,
            position,
        } => CreateEmbed::default()
            .description(text.added_to_queue(title, &format_duration(*duration_seconds), *position))
            .color(colors::INFO_BLUE),
        SessionNotice::NowPlaying {
            title,
            duration_seconds,
            url,
        } => CreateEmbed::default()
            .title(text.now_playing())
            .description(format!("**{}**", title))
            .url(url)
            .field(text.duration(), format_duration(*duration_seconds), true)
            .color(colors::SUCCESS_GREEN)
            .timestamp(Timestamp::now())
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER)),
        SessionNotice::LoopToggled { enabled } => CreateEmbed::default()
            .description(text.loop_toggled(*enabled))
            .color(colors::MUSIC_PURPLE),
        SessionNotice::SessionLeft => CreateEmbed::default()
            .description(text.left())
            .color(colors::NEUTRAL_GRAY),
        SessionNotice::PlaybackFailed { title, reason } => CreateEmbed::default()
            .title(text.error_title())
            .description(text.playback_failed(title))
            .footer(CreateEmbedFooter::new(reason))
            .color(colors::ERROR_RED),
    }
}

/// `/queue` view: the current track followed by a preview of what is queued.
///
/// `language` is used only when there is no session; a live session renders
/// in the language it was created with.
pub fn queue_embed(language: Language, snapshot: Option<&SessionSnapshot>) -> CreateEmbed {
    let language = snapshot.map_or(language, |s| s.language);
    let text = Text::new(language);
    let embed = CreateEmbed::default()
        .title(text.queue_title())
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    let Some(snapshot) = snapshot.filter(|s| {
        s.current.is_some() || !s.queue.is_empty() || s.pending_enqueues > 0
    }) else {
        return embed.description(text.queue_empty());
    };

    let mut embed = embed.description(format!("🔊 <#{}>", snapshot.target.channel_id));
    match (&snapshot.current, snapshot.status) {
        (Some(current), SessionStatus::Playing) => {
            embed = embed.field(text.now_playing(), now_playing_line(current, &text), false);
        }
        _ => embed = embed.field(text.now_playing(), text.idle(), false),
    }

    let mut upcoming = queue_lines(snapshot, &text);
    if snapshot.pending_enqueues > 0 {
        if !upcoming.is_empty() {
            upcoming.push('\n');
        }
        upcoming.push_str(&text.resolving(snapshot.pending_enqueues));
    }
    if !upcoming.is_empty() {
        embed = embed.field(text.up_next(), upcoming, false);
    }

    embed.field(text.loop_field(), text.on_off(snapshot.loop_enabled), true)
}

fn now_playing_line(track: &QueuedTrack, text: &Text) -> String {
    format!(
        "[{}]({}) `{}` · {} <t:{}:R>",
        track.title,
        track.canonical_url,
        format_duration(track.duration_seconds),
        text.added(),
        track.added_at.timestamp()
    )
}

fn queue_lines(snapshot: &SessionSnapshot, text: &Text) -> String {
    let mut lines: Vec<String> = snapshot
        .queue
        .iter()
        .take(QUEUE_PREVIEW)
        .enumerate()
        .map(|(i, track)| {
            format!(
                "`{}.` {} `{}`",
                i + 1,
                track.title,
                format_duration(track.duration_seconds)
            )
        })
        .collect();

    if snapshot.queue.len() > QUEUE_PREVIEW {
        lines.push(text.and_more(snapshot.queue.len() - QUEUE_PREVIEW));
    }
    lines.join("\n")
}

pub fn error_embed(language: Language, error: &PlayerError) -> CreateEmbed {
    let text = Text::new(language);
    CreateEmbed::default()
        .title(text.error_title())
        .description(text.error(error))
        .color(colors::ERROR_RED)
}

pub fn success_embed(description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

/// `H:MM:SS`, hours always shown.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SessionKey, VoiceTarget};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> QueuedTrack {
        QueuedTrack {
            external_id: title.to_string(),
            canonical_url: format!("https://example.com/{title}"),
            title: title.to_string(),
            duration_seconds: 61,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(200), "0:03:20");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn test_now_playing_labels_enqueue_time() {
        let track = track("now");
        let line = now_playing_line(&track, &Text::new(Language::En));
        assert_eq!(
            line,
            format!(
                "[now](https://example.com/now) `0:01:01` · added <t:{}:R>",
                track.added_at.timestamp()
            )
        );
    }

    #[test]
    fn test_queue_preview_is_capped() {
        let snapshot = SessionSnapshot {
            key: SessionKey(1),
            target: VoiceTarget {
                guild_id: 1,
                channel_id: 2,
            },
            language: Language::En,
            status: SessionStatus::Playing,
            current: Some(track("now")),
            queue: (0..12).map(|i| track(&format!("t{i}"))).collect(),
            loop_enabled: false,
            attempt: 1,
            pending_enqueues: 0,
        };

        let lines = queue_lines(&snapshot, &Text::new(Language::En));
        let lines: Vec<&str> = lines.lines().collect();
        assert_eq!(lines.len(), QUEUE_PREVIEW + 1);
        assert_eq!(lines[0], "`1.` t0 `0:01:01`");
        assert_eq!(lines[QUEUE_PREVIEW], "...and 2 more");
    }
}

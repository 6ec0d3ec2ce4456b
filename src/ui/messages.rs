//! User-facing text in every supported language.

use crate::{error::PlayerError, storage::Language};

/// Localized strings for one guild.
#[derive(Debug, Clone, Copy)]
pub struct Text {
    language: Language,
}

impl Text {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    fn pick(&self, en: &'static str, ja: &'static str) -> &'static str {
        match self.language {
            Language::En => en,
            Language::Ja => ja,
        }
    }

    pub fn need_voice_channel(&self) -> &'static str {
        self.pick(
            "❌ You need to be in a voice channel to play music.",
            "❌ 音楽を再生するにはボイスチャンネルに参加してください。",
        )
    }

    pub fn guild_only(&self) -> &'static str {
        self.pick(
            "❌ This command only works in a server.",
            "❌ このコマンドはサーバー内でのみ使用できます。",
        )
    }

    pub fn added_to_queue(&self, title: &str, duration: &str, position: usize) -> String {
        match self.language {
            Language::En => format!("✅ Added **{title}** ({duration}) to the queue at #{position}"),
            Language::Ja => format!("✅ **{title}** ({duration}) をキューの{position}番目に追加しました"),
        }
    }

    pub fn queued(&self, position: usize) -> String {
        match self.language {
            Language::En => format!("🎶 Queued at #{position}"),
            Language::Ja => format!("🎶 キューの{position}番目に追加しました"),
        }
    }

    pub fn now_playing(&self) -> &'static str {
        self.pick("🎵 Now Playing", "🎵 再生中")
    }

    pub fn duration(&self) -> &'static str {
        self.pick("⏱️ Duration", "⏱️ 再生時間")
    }

    pub fn loop_toggled(&self, enabled: bool) -> &'static str {
        if enabled {
            self.pick("🔂 Loop enabled", "🔂 ループを有効にしました")
        } else {
            self.pick("➡️ Loop disabled", "➡️ ループを無効にしました")
        }
    }

    pub fn left(&self) -> &'static str {
        self.pick("👋 Left the voice channel", "👋 ボイスチャンネルから退出しました")
    }

    pub fn stopped(&self) -> &'static str {
        self.pick(
            "⏹️ Playback stopped and queue cleared",
            "⏹️ 再生を停止し、キューをクリアしました",
        )
    }

    pub fn skipped(&self, title: &str) -> String {
        match self.language {
            Language::En => format!("⏭️ Skipped **{title}**"),
            Language::Ja => format!("⏭️ **{title}** をスキップしました"),
        }
    }

    pub fn playback_failed(&self, title: &str) -> String {
        match self.language {
            Language::En => format!("❌ Could not play **{title}**. Use /play to try again."),
            Language::Ja => format!("❌ **{title}** を再生できませんでした。/play で再試行してください。"),
        }
    }

    pub fn queue_title(&self) -> &'static str {
        self.pick("📜 Queue", "📜 キュー")
    }

    pub fn queue_empty(&self) -> &'static str {
        self.pick("The queue is empty", "キューは空です")
    }

    pub fn added(&self) -> &'static str {
        self.pick("added", "追加")
    }

    pub fn idle(&self) -> &'static str {
        self.pick("Nothing is playing", "再生中の曲はありません")
    }

    pub fn resolving(&self, count: usize) -> String {
        match self.language {
            Language::En => format!("⏳ {count} track(s) still loading"),
            Language::Ja => format!("⏳ {count} 曲を読み込み中"),
        }
    }

    pub fn up_next(&self) -> &'static str {
        self.pick("Up next", "次に再生")
    }

    pub fn and_more(&self, count: usize) -> String {
        match self.language {
            Language::En => format!("...and {count} more"),
            Language::Ja => format!("...他 {count} 曲"),
        }
    }

    pub fn loop_field(&self) -> &'static str {
        self.pick("🔁 Loop", "🔁 ループ")
    }

    pub fn on_off(&self, enabled: bool) -> &'static str {
        match (enabled, self.language) {
            (true, Language::En) => "On",
            (false, Language::En) => "Off",
            (true, Language::Ja) => "オン",
            (false, Language::Ja) => "オフ",
        }
    }

    pub fn setup(&self) -> &'static str {
        self.pick(
            "🌐 Language set to English",
            "🌐 言語を日本語に設定しました",
        )
    }

    pub fn error_title(&self) -> &'static str {
        self.pick("❌ Error", "❌ エラー")
    }

    /// What the user sees for a failed command.
    pub fn error(&self, error: &PlayerError) -> String {
        let text = match error {
            PlayerError::InvalidInput(_) => self.pick(
                "This link or query is not allowed.",
                "このリンクまたは検索語は使用できません。",
            ),
            PlayerError::Resolution(_) => self.pick(
                "No results found.",
                "検索結果が見つかりませんでした。",
            ),
            PlayerError::StreamRefresh(_) | PlayerError::Transport(_) => self.pick(
                "Playback failed. Please try again.",
                "再生に失敗しました。もう一度お試しください。",
            ),
            PlayerError::NothingPlaying => self.pick(
                "Nothing is playing right now.",
                "現在再生中の曲はありません。",
            ),
            PlayerError::QueueFull { max } => {
                return match self.language {
                    Language::En => format!("The queue is full (max {max} tracks)."),
                    Language::Ja => format!("キューがいっぱいです(最大{max}曲)。"),
                };
            }
            PlayerError::NoSession => self.pick(
                "I'm not playing in this server.",
                "このサーバーでは再生していません。",
            ),
            PlayerError::SessionClosed => self.pick(
                "The player was just stopped. Please try again.",
                "プレイヤーが停止されました。もう一度お試しください。",
            ),
        };
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_added_to_queue_includes_position() {
        let text = Text::new(Language::En);
        assert_eq!(
            text.added_to_queue("Song", "0:03:20", 2),
            "✅ Added **Song** (0:03:20) to the queue at #2"
        );
        assert!(Text::new(Language::Ja)
            .added_to_queue("Song", "0:03:20", 2)
            .contains("2番目"));
    }

    #[test]
    fn test_errors_are_localized() {
        let error = PlayerError::QueueFull { max: 5 };
        assert_eq!(Text::new(Language::En).error(&error), "The queue is full (max 5 tracks).");
        assert_ne!(
            Text::new(Language::En).error(&PlayerError::NothingPlaying),
            Text::new(Language::Ja).error(&PlayerError::NothingPlaying)
        );
    }
}

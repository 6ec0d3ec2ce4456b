use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};
use tokio::fs;
use tracing::{info, warn};

/// Language used for a guild's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "EN")]
    En,
    #[serde(rename = "JP")]
    Ja,
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EN" => Ok(Language::En),
            "JP" | "JA" => Ok(Language::Ja),
            other => anyhow::bail!("unsupported language: {other}"),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::En => write!(f, "EN"),
            Language::Ja => write!(f, "JP"),
        }
    }
}

/// Read side used by the playback core when a session is created.
#[cfg_attr(test, mockall::automock)]
pub trait LanguageStore: Send + Sync {
    fn language(&self, guild_id: u64) -> Language;
}

/// Per-guild settings stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: u64,
    #[serde(default)]
    pub language: Language,
}

/// Settings store backed by one JSON file per guild.
pub struct JsonStorage {
    data_dir: PathBuf,
    settings: RwLock<HashMap<u64, GuildSettings>>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(data_dir.join("servers")).await?;
        info!("📁 Storage initialized at: {}", data_dir.display());

        let storage = Self {
            data_dir,
            settings: RwLock::new(HashMap::new()),
        };
        storage.load_all().await?;
        Ok(storage)
    }

    pub fn settings(&self, guild_id: u64) -> GuildSettings {
        self.settings
            .read()
            .get(&guild_id)
            .cloned()
            .unwrap_or(GuildSettings {
                guild_id,
                language: Language::default(),
            })
    }

    /// Persists the language first, then updates the in-memory copy.
    pub async fn set_language(&self, guild_id: u64, language: Language) -> Result<()> {
        let mut settings = self.settings(guild_id);
        settings.language = language;

        let content = serde_json::to_string_pretty(&settings)?;
        fs::write(self.file_path(guild_id), content).await?;
        self.settings.write().insert(guild_id, settings);

        info!("💾 Language for guild {} set to {}", guild_id, language);
        Ok(())
    }

    async fn load_all(&self) -> Result<()> {
        let mut files = fs::read_dir(self.data_dir.join("servers")).await?;
        let mut loaded = HashMap::new();

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(guild_id) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok())
            else {
                continue;
            };

            let parsed = fs::read_to_string(&path)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<GuildSettings>(&content)?));
            match parsed {
                Ok(settings) => {
                    loaded.insert(guild_id, settings);
                }
                Err(e) => warn!("Error loading settings for guild {}: {}", guild_id, e),
            }
        }

        if !loaded.is_empty() {
            info!("📂 Loaded settings for {} guild(s)", loaded.len());
        }
        *self.settings.write() = loaded;
        Ok(())
    }

    fn file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir
            .join("servers")
            .join(format!("guild_{}.json", guild_id))
    }
}

impl LanguageStore for JsonStorage {
    fn language(&self, guild_id: u64) -> Language {
        self.settings(guild_id).language
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_language_codes() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("jp".parse::<Language>().unwrap(), Language::Ja);
        assert_eq!(" ja ".parse::<Language>().unwrap(), Language::Ja);
        assert!("fr".parse::<Language>().is_err());
    }

    #[tokio::test]
    async fn test_unknown_guild_defaults_to_english() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(storage.language(42), Language::En);
    }

    #[tokio::test]
    async fn test_language_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
            storage.set_language(7, Language::Ja).await.unwrap();
            assert_eq!(storage.language(7), Language::Ja);
        }

        let reloaded = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(reloaded.language(7), Language::Ja);
        assert_eq!(reloaded.language(8), Language::En);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let servers = dir.path().join("servers");
        std::fs::create_dir_all(&servers).unwrap();
        std::fs::write(servers.join("guild_5.json"), "{not json").unwrap();
        std::fs::write(servers.join("notes.txt"), "ignored").unwrap();

        let storage = JsonStorage::new(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(storage.language(5), Language::En);
    }
}

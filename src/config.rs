use anyhow::{Context, Result};
use std::{path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Slash commands registered on one guild only

    // Playback
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub loudness_normalization: bool,
    pub ffmpeg_path: String,

    // Resolver
    pub resolver_concurrency: usize,
    pub ytdlp_path: String,
    pub cookies_path: Option<PathBuf>,

    // Sessions
    pub reaper_interval: Duration,

    // Paths
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        std::fs::create_dir_all(&config.data_dir)?;
        config.validate()?;

        Ok(config)
    }

    /// Builds a config from an arbitrary variable source. Blank values count as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: var("GUILD_ID").map(|s| parse("GUILD_ID", &s)).transpose()?,

            // Playback
            default_volume: var("DEFAULT_VOLUME")
                .map(|s| parse("DEFAULT_VOLUME", &s))
                .transpose()?
                .unwrap_or(defaults.default_volume),
            max_queue_size: var("MAX_QUEUE_SIZE")
                .map(|s| parse("MAX_QUEUE_SIZE", &s))
                .transpose()?
                .unwrap_or(defaults.max_queue_size),
            loudness_normalization: var("LOUDNESS_NORMALIZATION")
                .map(|s| parse("LOUDNESS_NORMALIZATION", &s))
                .transpose()?
                .unwrap_or(defaults.loudness_normalization),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),

            // Resolver
            resolver_concurrency: var("RESOLVER_CONCURRENCY")
                .map(|s| parse("RESOLVER_CONCURRENCY", &s))
                .transpose()?
                .unwrap_or(defaults.resolver_concurrency),
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            cookies_path: var("COOKIES_PATH").map(PathBuf::from),

            // Sessions
            reaper_interval: match var("REAPER_INTERVAL") {
                Some(s) => humantime::parse_duration(s.trim())
                    .with_context(|| format!("REAPER_INTERVAL is not a duration: {s}"))?,
                None => defaults.reaper_interval,
            },

            // Paths
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Queue size and resolver concurrency must be greater than 0
    /// - The reaper interval must be at least one second
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.resolver_concurrency == 0 {
            anyhow::bail!("Resolver concurrency must be greater than 0");
        }

        if self.reaper_interval < Duration::from_secs(1) {
            anyhow::bail!(
                "Reaper interval must be at least 1s, got: {}",
                humantime::format_duration(self.reaper_interval)
            );
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Playback: {}% vol, {} queue, loudnorm {}\n  \
            Resolver: {} ({} workers, cookies: {})\n  \
            Sessions: reaped every {}\n  \
            Data: {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("on guild {id}")),
            (self.default_volume * 100.0).round() as u32,
            self.max_queue_size,
            if self.loudness_normalization { "on" } else { "off" },
            self.ytdlp_path,
            self.resolver_concurrency,
            self.cookies_path.is_some(),
            humantime::format_duration(self.reaper_interval),
            self.data_dir.display()
        )
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {value}"))
}

/// Fallbacks used when a variable is not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: 1000,
            loudness_normalization: true,
            ffmpeg_path: "ffmpeg".to_string(),

            resolver_concurrency: num_cpus::get().min(4),
            ytdlp_path: "yt-dlp".to_string(),
            cookies_path: None,

            reaper_interval: Duration::from_secs(60),

            data_dir: "./data".into(),
        }
    }
}

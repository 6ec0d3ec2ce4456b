use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod storage;
mod ui;

use crate::audio::{PlayOptions, QueueOrchestrator, SessionContext, SongbirdSink};
use crate::bot::{notifier::DiscordNotifier, GuildTuneBot};
use crate::config::Config;
use crate::sources::YtDlpResolver;
use crate::storage::JsonStorage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guildtune=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting GuildTune v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);

    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.cookies_path.clone(),
        config.resolver_concurrency,
    ));

    if std::env::args().any(|arg| arg == "--health-check") {
        let version = resolver.verify().await?;
        println!("OK (yt-dlp {version})");
        return Ok(());
    }

    info!("{}", config.summary());
    match resolver.verify().await {
        Ok(version) => info!("✅ yt-dlp {} available", version),
        Err(e) => error!("❌ yt-dlp check failed, playback will not work: {:?}", e),
    }

    let storage = Arc::new(JsonStorage::new(config.data_dir.clone()).await?);

    // Voice manager is created up front so the sink and the client share it
    let songbird = Songbird::serenity();
    let sink = Arc::new(SongbirdSink::new(songbird.clone(), config.ffmpeg_path.clone()));
    if config.loudness_normalization {
        match sink.verify_ffmpeg().await {
            Ok(version) => info!("✅ ffmpeg {} available", version),
            Err(e) => error!("❌ ffmpeg check failed, normalized playback will not work: {:?}", e),
        }
    }
    let http = Arc::new(Http::new(&config.discord_token));
    let notifier = Arc::new(DiscordNotifier::new(http));

    let ctx = SessionContext {
        resolver,
        sink,
        notifier: notifier.clone(),
        options: PlayOptions {
            volume: config.default_volume,
            normalize: config.loudness_normalization,
        },
        max_queue_size: config.max_queue_size,
    };
    let orchestrator = Arc::new(QueueOrchestrator::new(ctx, storage.clone()));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let shutdown = CancellationToken::new();
    let handler = GuildTuneBot::new(
        config.clone(),
        storage,
        orchestrator,
        notifier,
        shutdown.clone(),
    );

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Graceful shutdown
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error listening for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

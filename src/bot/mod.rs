//! # Bot Module
//!
//! Discord adapter around the playback core.
//!
//! - Slash command registration and dispatch
//! - Voice state tracking (external disconnects)
//! - Starting the inactivity reaper once the cache is ready
//!
//! ## Architecture
//!
//! [`GuildTuneBot`] implements Serenity's [`EventHandler`]. It never touches
//! playback state directly: every command goes through the
//! [`QueueOrchestrator`], and session notices come back through
//! [`notifier::DiscordNotifier`].

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;
pub mod presence;

use crate::{
    audio::{InactivityReaper, QueueOrchestrator, SessionKey},
    config::Config,
    storage::JsonStorage,
};
use notifier::DiscordNotifier;
use presence::CacheProbe;

pub struct GuildTuneBot {
    config: Arc<Config>,
    /// Per-guild settings (language)
    pub storage: Arc<JsonStorage>,
    pub orchestrator: Arc<QueueOrchestrator>,
    pub notifier: Arc<DiscordNotifier>,
    /// Cancels background tasks on shutdown
    shutdown: CancellationToken,
    reaper_started: AtomicBool,
}

impl GuildTuneBot {
    pub fn new(
        config: Arc<Config>,
        storage: Arc<JsonStorage>,
        orchestrator: Arc<QueueOrchestrator>,
        notifier: Arc<DiscordNotifier>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            storage,
            orchestrator,
            notifier,
            shutdown,
            reaper_started: AtomicBool::new(false),
        }
    }

    /// Registers slash commands globally, or on `GUILD_ID` when set.
    ///
    /// Guild commands show up almost immediately; global ones can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not in the configured guild: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registering guild commands: {:?}", e);
                        anyhow::anyhow!("Could not register guild commands. Check the 'applications.commands' scope.")
                    })?;
                info!("✅ Guild commands registered for: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registering global commands: {:?}", e);
                    anyhow::anyhow!("Could not register global commands. Check the 'applications.commands' scope.")
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    fn start_reaper(&self, ctx: &Context) {
        // `ready` fires again after reconnects.
        if self.reaper_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let reaper = InactivityReaper::new(
            self.orchestrator.clone(),
            Arc::new(CacheProbe::new(ctx.cache.clone())),
            self.config.reaper_interval,
        );
        tokio::spawn(reaper.run(self.shutdown.clone()));
    }
}

#[async_trait]
impl EventHandler for GuildTuneBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }

        self.start_reaper(&ctx);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Drops the session when the bot is removed from voice by someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            // Our own /stop and /leave land here too, after the session is already gone.
            if self.orchestrator.disconnected(SessionKey(guild_id.get())).await {
                info!("🔌 Bot disconnected externally in guild {}", guild_id);
            }
        }
    }
}

use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, info, warn};

use crate::{
    audio::{SessionKey, VoiceTarget},
    bot::GuildTuneBot,
    error::PlayerError,
    storage::{Language, LanguageStore},
    ui::{embeds, messages::Text},
};

/// Handles slash commands
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GuildTuneBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        let text = Text::new(Language::default());
        return respond(ctx, &command, ephemeral(text.guild_only())).await;
    };

    info!(
        "📝 /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Notices for this guild go wherever it last talked to the bot.
    bot.notifier.remember(guild_id.get(), command.channel_id);
    let language = bot.storage.language(guild_id.get());

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id, language).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id, language).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id, language).await?,
        "leave" => handle_leave(ctx, &command, bot, guild_id, language).await?,
        "loop" => handle_loop(ctx, &command, bot, guild_id, language).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id, language).await?,
        "setup" => handle_setup(ctx, &command, bot, guild_id).await?,
        other => {
            warn!("Unknown command /{}", other);
            respond(ctx, &command, ephemeral("❌ Unknown command")).await?;
        }
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildTuneBot,
    guild_id: GuildId,
    language: Language,
) -> Result<()> {
    let text = Text::new(language);
    let query = option_str(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query not provided"))?;

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond(ctx, command, ephemeral(text.need_voice_channel())).await;
    };

    // Resolution can take a few seconds
    command.defer_ephemeral(&ctx.http).await?;

    let target = VoiceTarget {
        guild_id: guild_id.get(),
        channel_id: channel_id.get(),
    };
    let reply = match bot.orchestrator.enqueue(target, query).await {
        Ok(position) => EditInteractionResponse::new().content(text.queued(position)),
        Err(e) => {
            warn!("❌ /play failed in guild {}: {}", guild_id, e);
            EditInteractionResponse::new().embed(embeds::error_embed(language, &e))
        }
    };
    command.edit_response(&ctx.http, reply).await?;

    Ok(())
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildTuneBot,
    guild_id: GuildId,
    language: Language,
) -> Result<()> {
    let message = match bot.orchestrator.skip(SessionKey(guild_id.get())).await {
        Ok(skipped) => CreateInteractionResponseMessage::new()
            .embed(embeds::success_embed(Text::new(language).skipped(&skipped.title))),
        Err(e) => error_message(language, &e),
    };
    respond(ctx, command, message).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildTuneBot,
    guild_id: GuildId,
    language: Language,
) -> Result<()> {
    let message = if bot.orchestrator.stop(SessionKey(guild_id.get())).await {
        CreateInteractionResponseMessage::new()
            .embed(embeds::success_embed(Text::new(language).stopped()))
    } else {
        error_message(language, &PlayerError::NoSession)
    };
    respond(ctx, command, message).await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildTuneBot,
    guild_id: GuildId,
    language: Language,
) -> Result<()> {
    // The channel-wide goodbye is posted by the notifier.
    let message = if bot.orchestrator.leave(SessionKey(guild_id.get())).await {
        ephemeral(Text::new(language).left())
    } else {
        error_message(language, &PlayerError::NoSession)
    };
    respond(ctx, command, message).await
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildTuneBot,
    guild_id: GuildId,
    language: Language,
) -> Result<()> {
    let message = match bot.orchestrator.toggle_loop(SessionKey(guild_id.get())).await {
        Ok(enabled) => ephemeral(Text::new(language).loop_toggled(enabled)),
        Err(e) => error_message(language, &e),
    };
    respond(ctx, command, message).await
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildTuneBot,
    guild_id: GuildId,
    language: Language,
) -> Result<()> {
    let snapshot = bot.orchestrator.snapshot(SessionKey(guild_id.get())).await;
    if let Some(snapshot) = &snapshot {
        debug!(
            "Queue view for guild {}: {} queued, attempt {}",
            snapshot.key,
            snapshot.queue.len(),
            snapshot.attempt
        );
    }
    let embed = embeds::queue_embed(language, snapshot.as_ref());
    respond(ctx, command, CreateInteractionResponseMessage::new().embed(embed)).await
}

async fn handle_setup(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &GuildTuneBot,
    guild_id: GuildId,
) -> Result<()> {
    let language: Language = option_str(command, "language")
        .ok_or_else(|| anyhow::anyhow!("Language not provided"))?
        .parse()?;

    bot.storage.set_language(guild_id.get(), language).await?;

    let embed = embeds::success_embed(Text::new(language).setup());
    respond(ctx, command, CreateInteractionResponseMessage::new().embed(embed)).await
}

// Helpers

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    message: CreateInteractionResponseMessage,
) -> Result<()> {
    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await?;
    Ok(())
}

fn ephemeral(content: impl Into<String>) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .content(content)
        .ephemeral(true)
}

fn error_message(language: Language, error: &PlayerError) -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .embed(embeds::error_embed(language, error))
        .ephemeral(true)
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

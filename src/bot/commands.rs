use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        stop_command(),
        leave_command(),
        loop_command(),
        queue_command(),
        setup_command(),
    ]
}

/// Registers global commands
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers commands on a single guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song from a URL or search query")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current song")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback and clear the queue")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave the voice channel")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Toggle repeating the current song")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the current queue")
}

// Settings

fn setup_command() -> CreateCommand {
    CreateCommand::new("setup")
        .description("Set the bot language for this server")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "language", "Message language")
                .required(true)
                .add_string_choice("English", "EN")
                .add_string_choice("日本語", "JP"),
        )
}

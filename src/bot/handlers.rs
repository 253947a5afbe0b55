use anyhow::Result;
use serenity::{
    builder::{CreateAllowedMentions, CreateInteractionResponse, CreateInteractionResponseMessage},
    model::application::CommandInteraction,
    prelude::Context,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{
    dispatch::{self, CommandArgs, CommandError, Invocation},
    KaraokeBot,
};
use crate::ui::Reply;

/// Base pause before retrying a busy database; grows with each attempt.
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &KaraokeBot) -> Result<()> {
    let Some(guild) = command.guild_id else {
        return respond(ctx, &command, Reply::private("❌ This command only works inside a server.")).await;
    };

    let (path, options) = dispatch::command_path(&command.data.name, &command.data.options);

    info!("📝 /{} used by {} in guild {}", path, command.user.name, guild);

    let Some(route) = bot.commands.resolve(&path) else {
        warn!("⚠️ Unknown command /{}", path);
        return respond(ctx, &command, Reply::private("❌ Unknown command")).await;
    };

    let invocation = Invocation {
        route,
        guild,
        invoker: command.user.id,
        args: CommandArgs::from_options(options),
    };

    let reply = run(bot, invocation).await?;
    respond(ctx, &command, reply).await
}

/// Executes the invocation off the gateway task, retrying while the database
/// reports itself busy.
async fn run(bot: &KaraokeBot, invocation: Invocation) -> Result<Reply> {
    let max_retries = bot.config.storage.max_retries;
    let mut attempt = 0;

    loop {
        let engine = bot.engine.clone();
        let templates = bot.templates.clone();
        let job = invocation.clone();

        let outcome = tokio::task::spawn_blocking(move || dispatch::execute(&engine, &templates, &job)).await?;

        match outcome {
            Ok(reply) => return Ok(reply),
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                warn!(
                    "🔁 Database busy in guild {}, retry {}/{}: {}",
                    invocation.guild, attempt, max_retries, err
                );
                tokio::time::sleep(RETRY_DELAY * attempt).await;
            }
            Err(err) => {
                match &err {
                    CommandError::Queue(queue_err) if queue_err.is_storage() => {
                        error!("❌ /{} failed in guild {}: {:?}", invocation.route.path(), invocation.guild, err)
                    }
                    _ => debug!("🚫 /{} rejected in guild {}: {}", invocation.route.path(), invocation.guild, err),
                }
                return Ok(err.reply(invocation.invoker));
            }
        }
    }
}

async fn respond(ctx: &Context, command: &CommandInteraction, reply: Reply) -> Result<()> {
    let mentions = match reply.ping {
        Some(user) => CreateAllowedMentions::new().users(vec![user]),
        None => CreateAllowedMentions::new(),
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(reply.content)
                    .ephemeral(reply.ephemeral)
                    .allowed_mentions(mentions),
            ),
        )
        .await?;

    Ok(())
}

use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{Command, CommandOptionType},
        id::GuildId,
    },
    prelude::Context,
};

/// Longest song name accepted from `/queue add`, `add-someone` and `edit-song`.
pub const MAX_SONG_LEN: u16 = 200;
/// Longest announcement template accepted from `/nextmsg add`.
pub const MAX_TEMPLATE_LEN: u16 = 500;
pub const MAX_TEMPLATE_NAME_LEN: u16 = 64;

/// Every slash command the bot exposes.
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        queue_command(),
        next_command(),
        current_command(),
        nextmsg_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

/// Registra comandos para una guild específica
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

fn subcommand(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::SubCommand, name, description)
}

fn song_option(description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::String, "song", description).max_length(MAX_SONG_LEN)
}

fn requeue_option(description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::Boolean, "requeue", description)
}

fn user_option(name: &str, description: &str) -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::User, name, description).required(true)
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Manage the karaoke queue")
        .add_option(
            subcommand("list", "Displays the current queue.").add_sub_option(CreateCommandOption::new(
                CommandOptionType::Boolean,
                "public",
                "Display the queue publicly.",
            )),
        )
        .add_option(
            subcommand("add", "Add yourself to the end of the queue.")
                .add_sub_option(song_option("What song you'll sing."))
                .add_sub_option(requeue_option("Re-add you to the queue when your turn is over.")),
        )
        .add_option(
            subcommand("add-someone", "Add a user to the end of the queue.")
                .add_sub_option(user_option("user", "User to add to the queue."))
                .add_sub_option(song_option("What song the enqueued will sing."))
                .add_sub_option(requeue_option("Re-add user to the queue when their turn is over.")),
        )
        .add_option(subcommand("remove", "Remove yourself from the queue."))
        .add_option(
            subcommand("remove-someone", "Remove a user from the queue.")
                .add_sub_option(user_option("user", "User to remove from the queue.")),
        )
        .add_option(subcommand("sink", "Move yourself to the bottom of the queue."))
        .add_option(
            subcommand("swap", "Swap the positions of two people in the queue.")
                .add_sub_option(user_option("user1", "First user."))
                .add_sub_option(user_option("user2", "Second user.")),
        )
        .add_option(
            subcommand("move", "Move this user to a specific spot in the queue.")
                .add_sub_option(user_option("user", "User to move."))
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::Integer, "position", "Position to move user to.")
                        .min_int_value(1)
                        .required(true),
                ),
        )
        .add_option(subcommand("clear", "Clear the queue."))
        .add_option(
            subcommand("edit-song", "Edit your proposed song in the queue.")
                .add_sub_option(song_option("What song you'll sing.").required(true)),
        )
}

// Comandos de turno

fn next_command() -> CreateCommand {
    CreateCommand::new("next").description("Advance the queue.")
}

fn current_command() -> CreateCommand {
    CreateCommand::new("current").description("See who's currently up.")
}

// Comandos de anuncios

fn nextmsg_command() -> CreateCommand {
    CreateCommand::new("nextmsg")
        .description("Manage the 'next up' announcements")
        .add_option(subcommand(
            "list",
            "Displays all the templates for the 'next up' messages.",
        ))
        .add_option(
            subcommand("add", "Add a new 'next up' message template.")
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "template",
                        "The template message. Placeholders: {user} = username; {song} = song name.",
                    )
                    .max_length(MAX_TEMPLATE_LEN)
                    .required(true),
                )
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "name",
                        "The name of this template message.",
                    )
                    .max_length(MAX_TEMPLATE_NAME_LEN),
                ),
        )
        .add_option(
            subcommand("remove", "Removes a 'next up' message template.").add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "name",
                    "The name of the template message to remove.",
                )
                .required(true),
            ),
        )
}

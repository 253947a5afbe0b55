//! # Bot Module
//!
//! Discord front end of the karaoke queue.
//!
//! This module contains:
//! - Slash command registration ([`commands`])
//! - The command table and synchronous execution ([`dispatch`])
//! - Interaction handling and replies ([`handlers`])
//!
//! ## Architecture
//!
//! [`KaraokeBot`] implements Serenity's [`EventHandler`]. Each slash command
//! is resolved through a [`CommandTable`] built at startup and runs exactly
//! one operation on the [`QueueEngine`] or the [`TemplateStore`]. Storage
//! calls are blocking, so they run on Tokio's blocking pool.
//!
//! ## Example
//!
//! ```rust,no_run
//! use karaoke_queue::{bot::KaraokeBot, config::Config, storage::Database};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let db = Database::open(&config.storage)?;
//! let bot = KaraokeBot::new(config, db);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod dispatch;
pub mod handlers;

use crate::{config::Config, queue::QueueEngine, storage::Database, templates::TemplateStore};
use dispatch::CommandTable;

/// Discord event handler for the karaoke queue.
pub struct KaraokeBot {
    /// Bot configuration loaded at startup
    config: Arc<Config>,
    engine: QueueEngine,
    templates: TemplateStore,
    commands: CommandTable,
}

impl KaraokeBot {
    pub fn new(config: Config, db: Database) -> Self {
        Self {
            config: Arc::new(config),
            engine: QueueEngine::new(db.clone()),
            templates: TemplateStore::new(db),
            commands: CommandTable::new(),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// With configured guild ids the commands are set per guild and show up
    /// within seconds; otherwise they are registered globally, which can take
    /// up to an hour to propagate.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        if self.config.guild_ids.is_empty() {
            info!("🌐 Registering commands globally");
            commands::register_global_commands(ctx).await?;
            info!("✅ Global commands registered");
            return Ok(());
        }

        for &id in &self.config.guild_ids {
            let guild_id = GuildId::new(id);
            commands::register_guild_commands(ctx, guild_id).await?;
            info!("✅ Guild commands registered for: {}", guild_id);
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for KaraokeBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎤 {} is connected!", ready.user.name);

        if let Err(e) = self.register_commands(&ctx).await {
            error!(
                "❌ Error registering commands: {:?}. Check that the bot has the 'applications.commands' scope.",
                e
            );
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }
}

use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use std::fs::OpenOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use karaoke_queue::{bot::KaraokeBot, config::Config, storage::Database};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar configuración
    let config = Config::load()?;

    init_logging(&config)?;

    info!("🎤 Starting Karaoke Queue Bot v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config.summary());

    // Inicializar base de datos
    let db = Database::open(&config.storage)?;

    // Slash commands only need guild events
    let intents = GatewayIntents::GUILDS;

    let handler = KaraokeBot::new(config.clone(), db);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error registering Ctrl+C handler: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

/// The configured level applies to this crate on top of any `RUST_LOG`
/// directives. With `log_path` set, output is appended to that file instead
/// of stdout.
fn init_logging(config: &Config) -> Result<()> {
    let level = config.log_level();
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("karaoke_queue={}", level).parse()?)
        .add_directive(format!("karaoke_queue_bot={}", level).parse()?)
        .add_directive("serenity=warn".parse()?);

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.log_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            subscriber
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => subscriber.init(),
    }

    Ok(())
}

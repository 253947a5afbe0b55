use anyhow::Result;
use config::{builder::DefaultState, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Environment variable pointing at an alternative YAML config file.
pub const CONFIG_PATH_VAR: &str = "KARAOKE_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    #[serde(default)]
    pub guild_ids: Vec<u64>, // Empty = global commands

    // Logging
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    pub logging_level: String,

    // Storage
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub busy_timeout_ms: u64,
    pub pool_size: u32,
    pub max_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/karaoke_queue.db".into(),
            busy_timeout_ms: 5000,
            pool_size: 4,
            max_retries: 2,
        }
    }
}

impl Config {
    /// Loads configuration from defaults, the YAML file and `KARAOKE__*`
    /// environment variables, in increasing priority.
    ///
    /// The file is optional. Its path comes from `KARAOKE_CONFIG` and falls
    /// back to `config.yaml` in the working directory.
    ///
    /// # Example
    ///
    /// ```env
    /// KARAOKE__DISCORD_TOKEN=...
    /// KARAOKE__GUILD_IDS=123456789,987654321
    /// KARAOKE__STORAGE__DATABASE_PATH=/var/lib/karaoke/queue.db
    /// ```
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config: Self = Self::builder()?
            .add_source(File::new(&path, FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix("KARAOKE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("guild_ids"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML document on top of the defaults, without touching the
    /// environment.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = Self::builder()?
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = StorageConfig::default();

        Ok(config::Config::builder()
            .set_default("discord_token", "")?
            .set_default("logging_level", "info")?
            .set_default(
                "storage.database_path",
                defaults.database_path.to_string_lossy().to_string(),
            )?
            .set_default("storage.busy_timeout_ms", defaults.busy_timeout_ms)?
            .set_default("storage.pool_size", defaults.pool_size as u64)?
            .set_default("storage.max_retries", defaults.max_retries as u64)?)
    }

    /// Rejects values the bot cannot start with.
    ///
    /// - The Discord token must be present
    /// - Guild ids must be non-zero snowflakes
    /// - The database path must not be empty
    /// - The connection pool must hold at least one connection
    /// - The busy timeout must be positive, otherwise concurrent writers fail
    ///   immediately instead of waiting their turn
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token is empty, set discord_token or KARAOKE__DISCORD_TOKEN");
        }

        if self.guild_ids.contains(&0) {
            anyhow::bail!("Guild id 0 is not a valid Discord guild");
        }

        if self.storage.database_path.as_os_str().is_empty() {
            anyhow::bail!("Database path is empty");
        }

        if self.storage.pool_size == 0 {
            anyhow::bail!("Storage pool size must be greater than 0");
        }

        if self.storage.busy_timeout_ms == 0 {
            anyhow::bail!("Storage busy timeout must be greater than 0");
        }

        Ok(())
    }

    /// Maps the configured level name to a filter. Unknown names fall back
    /// to `info`.
    pub fn log_level(&self) -> LevelFilter {
        match self.logging_level.to_lowercase().as_str() {
            "critical" | "error" => LevelFilter::ERROR,
            "warning" | "warn" => LevelFilter::WARN,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }

    /// Returns a summary of the configuration without the token.
    pub fn summary(&self) -> String {
        let guilds = if self.guild_ids.is_empty() {
            "global".to_string()
        } else {
            self.guild_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!(
            "Config Summary:\n  \
            Discord: commands for {}\n  \
            Logging: {} -> {}\n  \
            Storage: {} (pool {}, busy timeout {}ms, {} retries)",
            guilds,
            self.log_level(),
            self.log_path
                .as_ref()
                .map_or("stdout".to_string(), |p| p.display().to_string()),
            self.storage.database_path.display(),
            self.storage.pool_size,
            self.storage.busy_timeout_ms,
            self.storage.max_retries,
        )
    }
}

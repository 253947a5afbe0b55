//! # Templates Module
//!
//! Per-guild "next performer" announcements.
//!
//! A template is free text with two placeholders:
//!
//! - `{user}`: replaced by a mention of the performer
//! - `{song}`: replaced by the performer's song
//!
//! Templates that mention `{song}` are only used for performers who gave a
//! song, the others only for performers who did not. When a guild has no
//! matching template the built-in defaults apply.

use rand::{seq::SliceRandom, Rng};
use rusqlite::{params, Connection, OptionalExtension};
use serenity::model::id::{GuildId, UserId};
use tracing::info;

use crate::error::{QueueError, QueueResult};
use crate::queue::QueueEntry;
use crate::storage::{sql_id, Database};

pub const DEFAULT_WITH_SONG: &str = "{user} is up next! They'll be singing \"{song}\"!";
pub const DEFAULT_NO_SONG: &str = "{user} is up next!";

const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const NAME_LENGTH: usize = 8;

/// Generated names are retried at most this many times before giving up.
pub const MAX_NAME_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextMessageTemplate {
    pub guild_id: GuildId,
    pub name: String,
    pub msg: String,
    pub has_song: bool,
}

impl NextMessageTemplate {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            guild_id: GuildId::new(row.get::<_, i64>(0)? as u64),
            name: row.get(1)?,
            msg: row.get(2)?,
            has_song: row.get(3)?,
        })
    }
}

/// Where announcements come from when the queue advances.
#[cfg_attr(test, mockall::automock)]
pub trait AnnouncementSource {
    /// A random template of `guild` whose song flag equals `has_song`.
    fn pick(&self, guild: GuildId, has_song: bool) -> QueueResult<Option<String>>;
}

#[derive(Clone)]
pub struct TemplateStore {
    db: Database,
}

impl TemplateStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stores a template. Without a name, a random unused one is generated.
    pub fn add(&self, guild: GuildId, msg: &str, name: Option<&str>) -> QueueResult<NextMessageTemplate> {
        let requested = name.map(str::trim).filter(|n| !n.is_empty());

        self.db.write(|tx| {
            let name = match requested {
                Some(name) => {
                    if name_exists(tx, guild, name)? {
                        return Err(QueueError::TemplateNameTaken(name.to_string()));
                    }
                    name.to_string()
                }
                None => {
                    let mut rng = rand::thread_rng();
                    unused_name(tx, guild, || random_name(&mut rng))?
                }
            };

            let template = NextMessageTemplate {
                guild_id: guild,
                has_song: msg.contains("{song}"),
                msg: msg.to_string(),
                name,
            };

            tx.execute(
                "INSERT INTO next_message_template (guild_id, name, msg, has_song) VALUES (?1, ?2, ?3, ?4)",
                params![sql_id(guild.get()), template.name, template.msg, template.has_song],
            )?;

            info!("📝 Template \"{}\" added in guild {}", template.name, guild);
            Ok(template)
        })
    }

    pub fn remove(&self, guild: GuildId, name: &str) -> QueueResult<NextMessageTemplate> {
        self.db.write(|tx| {
            let template = tx
                .query_row(
                    "SELECT guild_id, name, msg, has_song FROM next_message_template WHERE guild_id = ?1 AND name = ?2",
                    params![sql_id(guild.get()), name],
                    NextMessageTemplate::from_row,
                )
                .optional()?
                .ok_or_else(|| QueueError::TemplateNotFound(name.to_string()))?;

            tx.execute(
                "DELETE FROM next_message_template WHERE guild_id = ?1 AND name = ?2",
                params![sql_id(guild.get()), name],
            )?;

            info!("🗑️ Template \"{}\" removed in guild {}", name, guild);
            Ok(template)
        })
    }

    pub fn list(&self, guild: GuildId) -> QueueResult<Vec<NextMessageTemplate>> {
        self.db.read(|tx| {
            let mut stmt = tx.prepare(
                "SELECT guild_id, name, msg, has_song FROM next_message_template WHERE guild_id = ?1 ORDER BY name",
            )?;
            let templates = stmt
                .query_map([sql_id(guild.get())], NextMessageTemplate::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(templates)
        })
    }
}

impl AnnouncementSource for TemplateStore {
    fn pick(&self, guild: GuildId, has_song: bool) -> QueueResult<Option<String>> {
        let candidates: Vec<String> = self.db.read(|tx| {
            let mut stmt = tx.prepare(
                "SELECT msg FROM next_message_template WHERE guild_id = ?1 AND has_song = ?2",
            )?;
            let msgs = stmt
                .query_map(params![sql_id(guild.get()), has_song], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, QueueError>(msgs)
        })?;

        Ok(candidates.choose(&mut rand::thread_rng()).cloned())
    }
}

/// Builds the announcement for the performer who just took the stage.
pub fn announcement(source: &impl AnnouncementSource, entry: &QueueEntry) -> QueueResult<String> {
    let song = sung(entry);

    let template = match source.pick(entry.guild_id, song.is_some())? {
        Some(template) => template,
        None => default_template(song.is_some()).to_string(),
    };

    Ok(render(&template, entry.user_id, song))
}

/// The built-in announcement, used when no template can be read.
pub fn default_announcement(entry: &QueueEntry) -> String {
    let song = sung(entry);
    render(default_template(song.is_some()), entry.user_id, song)
}

fn default_template(has_song: bool) -> &'static str {
    if has_song {
        DEFAULT_WITH_SONG
    } else {
        DEFAULT_NO_SONG
    }
}

/// An empty song counts as no song.
fn sung(entry: &QueueEntry) -> Option<&str> {
    entry.song_name.as_deref().filter(|s| !s.is_empty())
}

pub fn render(template: &str, user: UserId, song: Option<&str>) -> String {
    template
        .replace("{user}", &format!("<@{}>", user))
        .replace("{song}", song.unwrap_or_default())
}

fn name_exists(conn: &Connection, guild: GuildId, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM next_message_template WHERE guild_id = ?1 AND name = ?2",
        params![sql_id(guild.get()), name],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

fn unused_name(conn: &Connection, guild: GuildId, mut generate: impl FnMut() -> String) -> QueueResult<String> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let candidate = generate();
        if !name_exists(conn, guild, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(QueueError::NameSpaceExhausted)
}

fn random_name(rng: &mut impl Rng) -> String {
    (0..NAME_LENGTH)
        .map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())] as char)
        .collect()
}

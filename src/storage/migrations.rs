// Schema migrations
use rusqlite::Connection;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    // Queue entries, one per (guild, performer)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            song_name TEXT,
            queue_pos INTEGER NOT NULL,
            requeue INTEGER NOT NULL DEFAULT 0,
            added_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_guild_user ON queue(guild_id, user_id)",
        [],
    )?;

    // Not unique: range shifts move positions through transient duplicates
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_queue_guild_pos ON queue(guild_id, queue_pos)",
        [],
    )?;

    // "Next performer" announcement templates
    conn.execute(
        "CREATE TABLE IF NOT EXISTS next_message_template (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            msg TEXT NOT NULL,
            has_song INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_template_guild_name ON next_message_template(guild_id, name)",
        [],
    )?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(())
}

//! Row-level queries and the range shifts that keep positions gapless.
//!
//! Every function runs on the caller's transaction; none of them commits.

use rusqlite::{params, Connection, OptionalExtension};
use serenity::model::id::{GuildId, UserId};
use std::ops::RangeInclusive;
use tracing::debug;

use super::entry::{QueueEntry, CURRENT_POSITION};
use crate::storage::sql_id;

pub(super) fn find(conn: &Connection, guild: GuildId, user: UserId) -> rusqlite::Result<Option<QueueEntry>> {
    conn.query_row(
        &format!("{} WHERE guild_id = ?1 AND user_id = ?2", QueueEntry::SELECT),
        params![sql_id(guild.get()), sql_id(user.get())],
        QueueEntry::from_row,
    )
    .optional()
}

pub(super) fn current(conn: &Connection, guild: GuildId) -> rusqlite::Result<Option<QueueEntry>> {
    conn.query_row(
        &format!("{} WHERE guild_id = ?1 AND queue_pos = ?2", QueueEntry::SELECT),
        params![sql_id(guild.get()), CURRENT_POSITION],
        QueueEntry::from_row,
    )
    .optional()
}

/// Waiting entries (position >= 1), front first.
pub(super) fn waiting(conn: &Connection, guild: GuildId) -> rusqlite::Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE guild_id = ?1 AND queue_pos >= 1 ORDER BY queue_pos",
        QueueEntry::SELECT
    ))?;

    let entries = stmt
        .query_map([sql_id(guild.get())], QueueEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Number of waiting entries, not counting the performer on stage.
pub(super) fn queue_length(conn: &Connection, guild: GuildId) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM queue WHERE guild_id = ?1 AND queue_pos >= 1",
        [sql_id(guild.get())],
        |row| row.get(0),
    )
}

pub(super) fn insert(conn: &Connection, entry: &QueueEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO queue (guild_id, user_id, song_name, queue_pos, requeue, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            sql_id(entry.guild_id.get()),
            sql_id(entry.user_id.get()),
            entry.song_name,
            entry.queue_pos,
            entry.requeue,
            entry.added_at,
        ],
    )?;
    Ok(())
}

pub(super) fn delete(conn: &Connection, guild: GuildId, user: UserId) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM queue WHERE guild_id = ?1 AND user_id = ?2",
        params![sql_id(guild.get()), sql_id(user.get())],
    )?;
    Ok(())
}

pub(super) fn set_position(conn: &Connection, guild: GuildId, user: UserId, position: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE queue SET queue_pos = ?1 WHERE guild_id = ?2 AND user_id = ?3",
        params![position, sql_id(guild.get()), sql_id(user.get())],
    )?;
    Ok(())
}

pub(super) fn set_song(conn: &Connection, guild: GuildId, user: UserId, song: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE queue SET song_name = ?1 WHERE guild_id = ?2 AND user_id = ?3",
        params![song, sql_id(guild.get()), sql_id(user.get())],
    )?;
    Ok(())
}

/// Adds `delta` to every position of the guild inside `range`.
pub(super) fn shift(conn: &Connection, guild: GuildId, range: RangeInclusive<i64>, delta: i64) -> rusqlite::Result<usize> {
    let (start, end) = (*range.start(), *range.end());
    let shifted = conn.execute(
        "UPDATE queue SET queue_pos = queue_pos + ?1
         WHERE guild_id = ?2 AND queue_pos BETWEEN ?3 AND ?4",
        params![delta, sql_id(guild.get()), start, end],
    )?;

    debug!(
        "↕️ Shifted {} entries in [{}, {}] by {} in guild {}",
        shifted, start, end, delta, guild
    );
    Ok(shifted)
}

/// Moves `user` to `target` as one contiguous shift.
///
/// Everyone strictly between the old and the new position slides one slot
/// toward the vacated one; relative order of all other entries is kept.
/// No range check happens here.
pub(super) fn reposition(conn: &Connection, guild: GuildId, user: UserId, target: i64) -> rusqlite::Result<()> {
    let old: i64 = conn.query_row(
        "SELECT queue_pos FROM queue WHERE guild_id = ?1 AND user_id = ?2",
        params![sql_id(guild.get()), sql_id(user.get())],
        |row| row.get(0),
    )?;

    if old == target {
        return Ok(());
    }

    if target < old {
        shift(conn, guild, target..=old - 1, 1)?;
    } else {
        shift(conn, guild, old + 1..=target, -1)?;
    }

    set_position(conn, guild, user, target)
}

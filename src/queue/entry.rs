use chrono::{DateTime, Utc};
use rusqlite::Row;
use serenity::model::id::{GuildId, UserId};

/// Position of the performer currently on stage.
pub const CURRENT_POSITION: i64 = 0;

/// A performer's place in a guild's queue.
///
/// Position 0 is the performer on stage; 1..N is the waiting line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub song_name: Option<String>,
    pub queue_pos: i64,
    pub requeue: bool,
    pub added_at: DateTime<Utc>,
}

impl QueueEntry {
    pub(crate) const SELECT: &'static str =
        "SELECT guild_id, user_id, song_name, queue_pos, requeue, added_at FROM queue";

    pub fn new(guild_id: GuildId, user_id: UserId, song_name: Option<String>, queue_pos: i64, requeue: bool) -> Self {
        Self {
            guild_id,
            user_id,
            song_name,
            queue_pos,
            requeue,
            added_at: Utc::now(),
        }
    }

    pub fn is_current(&self) -> bool {
        self.queue_pos == CURRENT_POSITION
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            guild_id: GuildId::new(row.get::<_, i64>(0)? as u64),
            user_id: UserId::new(row.get::<_, i64>(1)? as u64),
            song_name: row.get(2)?,
            queue_pos: row.get(3)?,
            requeue: row.get(4)?,
            added_at: row.get(5)?,
        })
    }
}

/// The stage and the waiting line of one guild, read in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub current: Option<QueueEntry>,
    pub waiting: Vec<QueueEntry>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.waiting.is_empty()
    }
}

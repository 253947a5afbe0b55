use serenity::model::id::{GuildId, UserId};
use tracing::{debug, info};

use super::entry::{QueueEntry, QueueSnapshot};
use super::positions;
use crate::error::{QueueError, QueueResult};
use crate::storage::{sql_id, Database};

/// Outcome of the transaction behind [`QueueEngine::advance`].
enum Advance {
    Next(QueueEntry),
    Empty,
}

/// Ordered performer queue, one per guild.
///
/// Every mutating method is a single write transaction: the preconditions
/// are checked, positions are renumbered and the result is committed, or
/// nothing is written at all.
#[derive(Clone)]
pub struct QueueEngine {
    db: Database,
}

impl QueueEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Appends `user` to the tail of the waiting line.
    pub fn add(&self, guild: GuildId, user: UserId, song: Option<String>, requeue: bool) -> QueueResult<QueueEntry> {
        self.db.write(|tx| {
            if positions::find(tx, guild, user)?.is_some() {
                return Err(QueueError::AlreadyQueued(user));
            }

            let position = positions::queue_length(tx, guild)? + 1;
            let entry = QueueEntry::new(guild, user, song, position, requeue);
            positions::insert(tx, &entry)?;

            info!("➕ {} joined the queue of guild {} at position {}", user, guild, position);
            Ok(entry)
        })
    }

    /// Deletes `user`'s entry and closes the gap behind it.
    ///
    /// Removing the performer on stage promotes the front of the line.
    pub fn remove(&self, guild: GuildId, user: UserId) -> QueueResult<QueueEntry> {
        self.db.write(|tx| {
            let entry = positions::find(tx, guild, user)?.ok_or(QueueError::NotQueued(user))?;

            positions::delete(tx, guild, user)?;
            positions::shift(tx, guild, entry.queue_pos + 1..=i64::MAX, -1)?;

            info!("➖ {} left the queue of guild {} from position {}", user, guild, entry.queue_pos);
            Ok(entry)
        })
    }

    /// Moves `user` to `position`, which must lie in `1..=queue length`.
    pub fn move_to(&self, guild: GuildId, user: UserId, position: i64) -> QueueResult<QueueEntry> {
        self.db.write(|tx| {
            let entry = positions::find(tx, guild, user)?.ok_or(QueueError::NotQueued(user))?;

            let length = positions::queue_length(tx, guild)?;
            if position < 1 || position > length {
                return Err(QueueError::InvalidPosition(position));
            }

            positions::reposition(tx, guild, user, position)?;

            info!("📍 {} moved from {} to {} in guild {}", user, entry.queue_pos, position, guild);
            Ok(QueueEntry {
                queue_pos: position,
                ..entry
            })
        })
    }

    /// Exchanges the positions of two performers.
    ///
    /// Returns both entries with their new positions, `first` then `second`.
    pub fn swap(&self, guild: GuildId, first: UserId, second: UserId) -> QueueResult<(QueueEntry, QueueEntry)> {
        self.db.write(|tx| {
            let a = positions::find(tx, guild, first)?.ok_or(QueueError::NotQueued(first))?;
            let b = positions::find(tx, guild, second)?.ok_or(QueueError::NotQueued(second))?;

            positions::reposition(tx, guild, first, b.queue_pos)?;
            positions::reposition(tx, guild, second, a.queue_pos)?;

            info!(
                "🔄 Swapped {} ({}) and {} ({}) in guild {}",
                first, a.queue_pos, second, b.queue_pos, guild
            );

            let (a_pos, b_pos) = (a.queue_pos, b.queue_pos);
            Ok((
                QueueEntry { queue_pos: b_pos, ..a },
                QueueEntry { queue_pos: a_pos, ..b },
            ))
        })
    }

    /// Moves `user` to the tail of the waiting line.
    pub fn sink(&self, guild: GuildId, user: UserId) -> QueueResult<QueueEntry> {
        self.db.write(|tx| {
            let entry = positions::find(tx, guild, user)?.ok_or(QueueError::NotQueued(user))?;

            let tail = positions::queue_length(tx, guild)?;
            positions::reposition(tx, guild, user, tail)?;

            info!("⬇️ {} sank from {} to {} in guild {}", user, entry.queue_pos, tail, guild);
            Ok(QueueEntry {
                queue_pos: tail,
                ..entry
            })
        })
    }

    /// Retires the performer on stage and promotes the front of the line.
    ///
    /// The retiring performer is deleted, or sent to the tail when their
    /// requeue flag is set. That retirement is committed even when nobody is
    /// left to promote, in which case [`QueueError::EmptyQueue`] is returned.
    pub fn advance(&self, guild: GuildId) -> QueueResult<QueueEntry> {
        let outcome = self.db.write(|tx| -> QueueResult<Advance> {
            if let Some(retiring) = positions::current(tx, guild)? {
                if retiring.requeue {
                    let tail = positions::queue_length(tx, guild)? + 1;
                    positions::set_position(tx, guild, retiring.user_id, tail)?;
                    debug!("🔁 {} requeued at {} in guild {}", retiring.user_id, tail, guild);
                } else {
                    positions::delete(tx, guild, retiring.user_id)?;
                    debug!("👋 {} finished in guild {}", retiring.user_id, guild);
                }
            }

            if positions::queue_length(tx, guild)? == 0 {
                return Ok(Advance::Empty);
            }

            positions::shift(tx, guild, 1..=i64::MAX, -1)?;

            let next = positions::current(tx, guild)?.ok_or(QueueError::EmptyQueue)?;
            Ok(Advance::Next(next))
        })?;

        match outcome {
            Advance::Next(entry) => {
                info!("🎤 {} is up in guild {}", entry.user_id, guild);
                Ok(entry)
            }
            Advance::Empty => {
                info!("📭 Queue of guild {} is empty", guild);
                Err(QueueError::EmptyQueue)
            }
        }
    }

    /// Waiting entries, front first. The performer on stage is not included.
    pub fn queue(&self, guild: GuildId) -> QueueResult<Vec<QueueEntry>> {
        self.db.read(|tx| Ok(positions::waiting(tx, guild)?))
    }

    /// The performer on stage, if any.
    pub fn current(&self, guild: GuildId) -> QueueResult<Option<QueueEntry>> {
        self.db.read(|tx| Ok(positions::current(tx, guild)?))
    }

    /// Stage and waiting line from the same snapshot.
    pub fn snapshot(&self, guild: GuildId) -> QueueResult<QueueSnapshot> {
        self.db.read(|tx| {
            Ok(QueueSnapshot {
                current: positions::current(tx, guild)?,
                waiting: positions::waiting(tx, guild)?,
            })
        })
    }

    /// Deletes every entry of the guild, including the performer on stage.
    pub fn clear(&self, guild: GuildId) -> QueueResult<usize> {
        self.db.write(|tx| {
            let removed = tx.execute("DELETE FROM queue WHERE guild_id = ?1", [sql_id(guild.get())])?;
            info!("🗑️ Cleared {} entries in guild {}", removed, guild);
            Ok(removed)
        })
    }

    /// Replaces `user`'s song without touching positions.
    pub fn edit_song(&self, guild: GuildId, user: UserId, song: &str) -> QueueResult<QueueEntry> {
        self.db.write(|tx| {
            let entry = positions::find(tx, guild, user)?.ok_or(QueueError::NotQueued(user))?;
            positions::set_song(tx, guild, user, song)?;

            debug!("🎶 {} now sings \"{}\" in guild {}", user, song, guild);
            Ok(QueueEntry {
                song_name: Some(song.to_string()),
                ..entry
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::connection::tests::temp_database;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn engine() -> (tempfile::TempDir, QueueEngine) {
        let (dir, db) = temp_database();
        (dir, QueueEngine::new(db))
    }

    fn guild(id: u64) -> GuildId {
        GuildId::new(id)
    }

    fn user(id: u64) -> UserId {
        UserId::new(id)
    }

    /// `(user, position)` for every entry of the guild, stage first.
    fn layout(engine: &QueueEngine, g: GuildId) -> Vec<(u64, i64)> {
        let snapshot = engine.snapshot(g).unwrap();
        snapshot
            .current
            .iter()
            .chain(snapshot.waiting.iter())
            .map(|e| (e.user_id.get(), e.queue_pos))
            .collect()
    }

    fn assert_contiguous(engine: &QueueEngine, g: GuildId) {
        let positions: Vec<i64> = layout(engine, g).into_iter().map(|(_, p)| p).collect();
        let start = if positions.first() == Some(&0) { 0 } else { 1 };
        let expected: Vec<i64> = (start..start + positions.len() as i64).collect();
        assert_eq!(positions, expected, "positions must be gapless");
    }

    fn fill(engine: &QueueEngine, g: GuildId, users: &[u64]) {
        for &u in users {
            engine.add(g, user(u), None, false).unwrap();
        }
    }

    #[test]
    fn add_appends_to_tail() {
        let (_dir, engine) = engine();
        let g = guild(1);

        let first = engine.add(g, user(10), Some("SongA".into()), false).unwrap();
        let second = engine.add(g, user(20), None, true).unwrap();

        assert_eq!(first.queue_pos, 1);
        assert_eq!(second.queue_pos, 2);
        assert!(second.requeue);
        assert_eq!(layout(&engine, g), vec![(10, 1), (20, 2)]);
    }

    #[test]
    fn add_twice_is_rejected() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10]);

        let err = engine.add(g, user(10), None, false).unwrap_err();
        assert!(matches!(err, QueueError::AlreadyQueued(u) if u == user(10)));
        assert_eq!(layout(&engine, g), vec![(10, 1)]);
    }

    #[test]
    fn add_after_current_does_not_touch_stage() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10]);
        engine.advance(g).unwrap();

        let entry = engine.add(g, user(20), None, false).unwrap();
        assert_eq!(entry.queue_pos, 1);
        assert_eq!(layout(&engine, g), vec![(10, 0), (20, 1)]);
    }

    #[test]
    fn remove_closes_gap() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30, 40]);

        let removed = engine.remove(g, user(20)).unwrap();
        assert_eq!(removed.queue_pos, 2);
        assert_eq!(layout(&engine, g), vec![(10, 1), (30, 2), (40, 3)]);
    }

    #[test]
    fn remove_missing_performer_fails() {
        let (_dir, engine) = engine();
        let err = engine.remove(guild(1), user(10)).unwrap_err();
        assert!(matches!(err, QueueError::NotQueued(u) if u == user(10)));
    }

    #[test]
    fn add_then_remove_restores_queue() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30]);
        engine.advance(g).unwrap();
        let before = layout(&engine, g);

        engine.add(g, user(99), None, false).unwrap();
        engine.remove(g, user(99)).unwrap();

        assert_eq!(layout(&engine, g), before);
    }

    #[test]
    fn move_toward_front_shifts_block_back() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30, 40, 50]);

        let moved = engine.move_to(g, user(40), 2).unwrap();
        assert_eq!(moved.queue_pos, 2);
        assert_eq!(
            layout(&engine, g),
            vec![(10, 1), (40, 2), (20, 3), (30, 4), (50, 5)]
        );
    }

    #[test]
    fn move_toward_back_shifts_block_forward() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30, 40, 50]);

        engine.move_to(g, user(20), 4).unwrap();
        assert_eq!(
            layout(&engine, g),
            vec![(10, 1), (30, 2), (40, 3), (20, 4), (50, 5)]
        );
    }

    #[test]
    fn move_to_same_position_is_noop() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20]);

        engine.move_to(g, user(20), 2).unwrap();
        assert_eq!(layout(&engine, g), vec![(10, 1), (20, 2)]);
    }

    #[test]
    fn move_rejects_out_of_range_positions() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30]);

        for bad in [0, -1, 4] {
            let err = engine.move_to(g, user(10), bad).unwrap_err();
            assert!(matches!(err, QueueError::InvalidPosition(p) if p == bad));
        }
        assert_eq!(layout(&engine, g), vec![(10, 1), (20, 2), (30, 3)]);
    }

    #[test]
    fn move_checks_membership_before_position() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10]);

        let err = engine.move_to(g, user(77), 9).unwrap_err();
        assert!(matches!(err, QueueError::NotQueued(_)));
    }

    #[test]
    fn move_there_and_back_restores_order() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30, 40, 50]);
        let before = layout(&engine, g);

        engine.move_to(g, user(50), 1).unwrap();
        engine.move_to(g, user(50), 5).unwrap();
        assert_eq!(layout(&engine, g), before);

        engine.move_to(g, user(10), 3).unwrap();
        engine.move_to(g, user(10), 1).unwrap();
        assert_eq!(layout(&engine, g), before);
    }

    #[test]
    fn swap_exchanges_positions() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30, 40]);

        let (a, b) = engine.swap(g, user(10), user(40)).unwrap();
        assert_eq!((a.queue_pos, b.queue_pos), (4, 1));
        assert_eq!(layout(&engine, g), vec![(40, 1), (20, 2), (30, 3), (10, 4)]);
    }

    #[test]
    fn swap_twice_is_identity() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30, 40, 50]);
        engine.advance(g).unwrap();
        let before = layout(&engine, g);

        engine.swap(g, user(30), user(10)).unwrap();
        engine.swap(g, user(30), user(10)).unwrap();
        assert_eq!(layout(&engine, g), before);
    }

    #[test]
    fn swap_with_current_performer() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30]);
        engine.advance(g).unwrap();

        engine.swap(g, user(10), user(30)).unwrap();
        assert_eq!(layout(&engine, g), vec![(30, 0), (20, 1), (10, 2)]);
    }

    #[test]
    fn swap_reports_which_performer_is_missing() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10]);

        let err = engine.swap(g, user(10), user(20)).unwrap_err();
        assert!(matches!(err, QueueError::NotQueued(u) if u == user(20)));

        let err = engine.swap(g, user(30), user(10)).unwrap_err();
        assert!(matches!(err, QueueError::NotQueued(u) if u == user(30)));
    }

    #[test]
    fn swap_with_self_is_noop() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20]);

        engine.swap(g, user(10), user(10)).unwrap();
        assert_eq!(layout(&engine, g), vec![(10, 1), (20, 2)]);
    }

    #[test]
    fn sink_moves_to_tail() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30]);

        let sunk = engine.sink(g, user(10)).unwrap();
        assert_eq!(sunk.queue_pos, 3);
        assert_eq!(layout(&engine, g), vec![(20, 1), (30, 2), (10, 3)]);
    }

    #[test]
    fn sink_from_stage_promotes_front_of_line() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30]);
        engine.advance(g).unwrap();

        let sunk = engine.sink(g, user(10)).unwrap();
        assert_eq!(sunk.queue_pos, 2);
        assert_eq!(layout(&engine, g), vec![(20, 0), (30, 1), (10, 2)]);
        assert_eq!(engine.current(g).unwrap().map(|e| e.user_id), Some(user(20)));
    }

    #[test]
    fn sink_of_lone_current_performer_stays_put() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10]);
        engine.advance(g).unwrap();

        engine.sink(g, user(10)).unwrap();
        assert_eq!(layout(&engine, g), vec![(10, 0)]);
    }

    #[test]
    fn advance_promotes_front() {
        let (_dir, engine) = engine();
        let g = guild(1);
        engine.add(g, user(10), Some("SongA".into()), false).unwrap();
        fill(&engine, g, &[20, 30]);

        let up = engine.advance(g).unwrap();
        assert_eq!(up.user_id, user(10));
        assert_eq!(up.song_name.as_deref(), Some("SongA"));
        assert_eq!(layout(&engine, g), vec![(10, 0), (20, 1), (30, 2)]);

        let up = engine.advance(g).unwrap();
        assert_eq!(up.user_id, user(20));
        assert_eq!(layout(&engine, g), vec![(20, 0), (30, 1)]);
    }

    #[test]
    fn advance_requeues_to_tail() {
        let (_dir, engine) = engine();
        let g = guild(1);
        engine.add(g, user(10), None, true).unwrap();
        fill(&engine, g, &[20, 30]);
        engine.advance(g).unwrap();

        let up = engine.advance(g).unwrap();
        assert_eq!(up.user_id, user(20));
        assert_eq!(layout(&engine, g), vec![(20, 0), (30, 1), (10, 2)]);
    }

    #[test]
    fn advance_requeued_solo_performer_comes_back() {
        let (_dir, engine) = engine();
        let g = guild(1);
        engine.add(g, user(10), Some("Encore".into()), true).unwrap();
        engine.advance(g).unwrap();

        let up = engine.advance(g).unwrap();
        assert_eq!(up.user_id, user(10));
        assert_eq!(layout(&engine, g), vec![(10, 0)]);
    }

    #[test]
    fn advance_with_nobody_waiting_reports_empty_and_retires_current() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10]);
        engine.advance(g).unwrap();

        let err = engine.advance(g).unwrap_err();
        assert!(matches!(err, QueueError::EmptyQueue));
        assert_eq!(layout(&engine, g), Vec::<(u64, i64)>::new());
    }

    #[test]
    fn advance_on_empty_guild_reports_empty() {
        let (_dir, engine) = engine();
        let err = engine.advance(guild(1)).unwrap_err();
        assert!(matches!(err, QueueError::EmptyQueue));
    }

    #[test]
    fn walkthrough_with_stage_removal() {
        let (_dir, engine) = engine();
        let g = guild(1);

        let u1 = engine.add(g, user(1), Some("SongA".into()), false).unwrap();
        assert_eq!(u1.queue_pos, 1);
        let u2 = engine.add(g, user(2), None, false).unwrap();
        assert_eq!(u2.queue_pos, 2);

        let up = engine.advance(g).unwrap();
        assert_eq!((up.user_id, up.song_name.as_deref()), (user(1), Some("SongA")));
        assert_eq!(layout(&engine, g), vec![(1, 0), (2, 1)]);

        engine.move_to(g, user(2), 1).unwrap();
        assert_eq!(layout(&engine, g), vec![(1, 0), (2, 1)]);

        engine.remove(g, user(1)).unwrap();
        assert_eq!(layout(&engine, g), vec![(2, 0)]);
    }

    #[test]
    fn queue_and_current_split_stage_from_line() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30]);
        engine.advance(g).unwrap();

        let waiting: Vec<u64> = engine.queue(g).unwrap().iter().map(|e| e.user_id.get()).collect();
        assert_eq!(waiting, vec![20, 30]);
        assert_eq!(engine.current(g).unwrap().map(|e| e.user_id), Some(user(10)));
    }

    #[test]
    fn clear_removes_stage_and_line() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20, 30]);
        engine.advance(g).unwrap();

        assert_eq!(engine.clear(g).unwrap(), 3);
        assert!(engine.snapshot(g).unwrap().is_empty());
    }

    #[test]
    fn guilds_are_isolated() {
        let (_dir, engine) = engine();
        fill(&engine, guild(1), &[10, 20]);
        fill(&engine, guild(2), &[10, 30]);

        engine.remove(guild(1), user(10)).unwrap();
        engine.clear(guild(1)).unwrap();

        assert_eq!(layout(&engine, guild(2)), vec![(10, 1), (30, 2)]);
    }

    #[test]
    fn edit_song_keeps_position() {
        let (_dir, engine) = engine();
        let g = guild(1);
        fill(&engine, g, &[10, 20]);

        let edited = engine.edit_song(g, user(20), "Bohemian Rhapsody").unwrap();
        assert_eq!(edited.song_name.as_deref(), Some("Bohemian Rhapsody"));
        assert_eq!(edited.queue_pos, 2);
        assert_eq!(
            engine.queue(g).unwrap()[1].song_name.as_deref(),
            Some("Bohemian Rhapsody")
        );

        assert!(matches!(
            engine.edit_song(g, user(30), "x"),
            Err(QueueError::NotQueued(_))
        ));
    }

    #[test]
    fn random_operations_keep_positions_gapless() {
        let (_dir, engine) = engine();
        let g = guild(1);
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..400 {
            let u = user(rng.gen_range(1..=8));
            let _ = match rng.gen_range(0..7) {
                0 | 1 => engine.add(g, u, None, rng.gen_bool(0.3)).map(|_| ()),
                2 => engine.remove(g, u).map(|_| ()),
                3 => engine.move_to(g, u, rng.gen_range(0..=6)).map(|_| ()),
                4 => engine.swap(g, u, user(rng.gen_range(1..=8))).map(|_| ()),
                5 => engine.sink(g, u).map(|_| ()),
                _ => engine.advance(g).map(|_| ()),
            };
            assert_contiguous(&engine, g);
        }
    }

    #[test]
    fn concurrent_adds_keep_positions_gapless() {
        let (_dir, engine) = engine();
        let g = guild(1);

        let handles: Vec<_> = (1..=16u64)
            .map(|u| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.add(g, user(u), None, false))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_contiguous(&engine, g);
        assert_eq!(engine.queue(g).unwrap().len(), 16);
    }
}

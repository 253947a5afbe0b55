//! # Queue Module
//!
//! Per-guild performer queue for karaoke events.
//!
//! ## Position Model
//!
//! Each performer holds at most one entry per guild. Entries are ordered by
//! an integer position:
//!
//! - **0**: the performer currently on stage (at most one)
//! - **1..N**: the waiting line, front first
//!
//! Within a guild the positions are always `{0..N}` or `{1..N}`: no gaps,
//! no duplicates. Every operation that inserts, deletes or moves an entry
//! shifts only the block of entries between the old and the new position,
//! so the invariant holds after each committed transaction.
//!
//! ## Lifecycle
//!
//! ```text
//! Absent --add--> Waiting(n) --advance--> Current(0) --advance--> Absent
//!                     ^                                  |
//!                     +------------- requeue ------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use karaoke_queue::{config::StorageConfig, queue::QueueEngine, storage::Database};
//! use serenity::all::{GuildId, UserId};
//!
//! # fn example() -> anyhow::Result<()> {
//! let engine = QueueEngine::new(Database::open(&StorageConfig::default())?);
//! let guild = GuildId::new(1);
//!
//! engine.add(guild, UserId::new(10), Some("Bohemian Rhapsody".into()), false)?;
//! engine.add(guild, UserId::new(20), None, true)?;
//!
//! let up = engine.advance(guild)?;
//! assert_eq!(up.user_id, UserId::new(10));
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod entry;
mod positions;

pub use engine::QueueEngine;
pub use entry::{QueueEntry, QueueSnapshot, CURRENT_POSITION};

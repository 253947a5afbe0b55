//! # Storage Module
//!
//! SQLite persistence for the karaoke queue.
//!
//! Two tables live in the database:
//!
//! - `queue`: one row per performer per guild, ordered by `queue_pos`
//! - `next_message_template`: per-guild "next performer" announcements
//!
//! Both carry an auto-increment `id` that is never used for ordering.
//!
//! ## Unit of Work
//!
//! Callers never hold a connection. They hand a closure to
//! [`Database::write`] or [`Database::read`], which wraps it in exactly one
//! transaction and guarantees commit-or-rollback on every exit path,
//! including early `?` returns and panics.
//!
//! ```rust,no_run
//! use karaoke_queue::{config::StorageConfig, storage::Database, error::QueueError};
//!
//! # fn example() -> anyhow::Result<()> {
//! let db = Database::open(&StorageConfig::default())?;
//! let rows: i64 = db.read(|tx| {
//!     tx.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))
//!         .map_err(QueueError::from)
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! The database runs in WAL mode: readers never block on writers, and
//! writers take the write lock at `BEGIN IMMEDIATE`, waiting up to the
//! configured busy timeout for their turn.

pub mod connection;
pub mod migrations;

pub use connection::Database;

/// Discord snowflakes fit in 63 bits, so they round-trip through SQLite's
/// signed `INTEGER`.
pub(crate) fn sql_id(id: u64) -> i64 {
    id as i64
}

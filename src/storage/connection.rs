// Database connection management
use anyhow::Result;
use r2d2::{ManageConnection, Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;
use tracing::{info, warn};

use super::migrations::run_migrations;
use crate::config::StorageConfig;

/// Handle to the SQLite database shared by the queue engine and the
/// template store.
///
/// Cloning is cheap: clones share the same `r2d2` pool. Every operation
/// borrows one connection for the duration of a single transaction, see
/// [`Database::write`] and [`Database::read`].
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteManager>,
}

/// [`SqliteConnectionManager`] that also discards connections returned to
/// the pool while still inside a transaction.
struct SqliteManager(SqliteConnectionManager);

impl ManageConnection for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> rusqlite::Result<Connection> {
        self.0.connect()
    }

    fn is_valid(&self, conn: &mut Connection) -> rusqlite::Result<()> {
        self.0.is_valid(conn)
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        if conn.is_autocommit() {
            return false;
        }
        warn!("⚠️ Discarding database connection left inside a transaction");
        true
    }
}

impl Database {
    pub fn open(config: &StorageConfig) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(&config.database_path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .build(SqliteManager(manager))?;

        run_migrations(&*pool.get()?)?;

        info!(
            "📁 Database ready at {} (pool of {})",
            config.database_path.display(),
            config.pool_size
        );

        Ok(Self { pool })
    }

    /// Runs `op` inside an `IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so two writers never interleave
    /// their reads and writes. The transaction commits only when `op`
    /// returns `Ok`; an `Err` or a panic drops it, which rolls back every
    /// statement `op` executed.
    pub fn write<T, E, F>(&self, op: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<rusqlite::Error> + From<r2d2::Error>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Runs `op` inside a deferred transaction so that every query it makes
    /// sees the same snapshot. Nothing is ever committed.
    pub fn read<T, E, F>(&self, op: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<rusqlite::Error> + From<r2d2::Error>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        op(&tx)
    }

    fn connection(&self) -> std::result::Result<PooledConnection<SqliteManager>, r2d2::Error> {
        self.pool.get()
    }
}

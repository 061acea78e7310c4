use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, Sqlite, SqlitePool};

pub mod scans;
pub mod tickets;

pub use scans::{NewScan, ScanLedger};
pub use tickets::{TicketFilter, TicketStore};

/// Explicitly constructed storage handle. Opened once at process start,
/// injected everywhere a store is needed, closed at shutdown; tests open their
/// own isolated instances instead of sharing ambient state.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the schema. Must run before any store is used.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    pub fn tickets(&self) -> TicketStore {
        TicketStore::new(self.pool.clone())
    }

    pub fn scans(&self) -> ScanLedger {
        ScanLedger::new(self.pool.clone())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Open a write transaction that takes SQLite's write lock up front.
///
/// A deferred transaction that reads before writing has to upgrade its lock
/// at the first write, and that upgrade fails with SQLITE_BUSY the moment any
/// other writer has committed in between; the busy handler does not retry an
/// upgrade. `BEGIN IMMEDIATE` acquires the write lock at open, so concurrent
/// writers queue on `busy_timeout` instead of aborting each other.
pub(crate) async fn begin_immediate(
    pool: &SqlitePool,
) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

/// Commit a transaction opened by [`begin_immediate`]. Rolls back on a failed
/// commit so the connection never returns to the pool mid-transaction.
pub(crate) async fn commit_tx(mut conn: PoolConnection<Sqlite>) -> Result<(), sqlx::Error> {
    if let Err(err) = sqlx::query("COMMIT").execute(&mut *conn).await {
        rollback_logged(conn).await;
        return Err(err);
    }
    Ok(())
}

/// Roll back a transaction opened by [`begin_immediate`]. If even the
/// rollback fails the connection is detached from the pool and closed rather
/// than handed back with a transaction still open.
pub(crate) async fn rollback_logged(mut conn: PoolConnection<Sqlite>) {
    if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        tracing::error!(error = %err, "Failed to roll back write transaction, discarding connection");
        let _ = conn.detach().close().await;
    }
}

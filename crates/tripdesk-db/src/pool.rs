//! # Connection Pool
//!
//! ```text
//!  DbConfig ──► Database::new ──► SqlitePool ──► migrations (embedded)
//!                                     │
//!          ┌──────────────┬───────────┼──────────────┬──────────────────┐
//!          ▼              ▼           ▼              ▼                  ▼
//!      quotes()      bookings()   wallets()    audit_log()   receipt_sequences()
//! ```
//!
//! Repository handles are cheap: each one holds a clone of the pool.
//!
//! A file database runs in WAL mode with a busy timeout, so a writer waiting
//! on another writer's CAS update blocks briefly instead of failing with
//! `SQLITE_BUSY`. An in-memory database is private to its pool and lives on
//! a single connection that is never recycled.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::audit::SqliteAuditLog;
use crate::repository::booking::SqliteBookingRepository;
use crate::repository::quote::SqliteQuoteRepository;
use crate::repository::sequence::SqliteReceiptSequence;
use crate::repository::wallet::SqliteWalletRepository;

const IN_MEMORY: &str = ":memory:";

/// Where the database lives and how the pool behaves.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/tripdesk/tripdesk.db").max_connections(8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection.
    pub acquire_timeout: Duration,
    /// How long SQLite waits on a locked database before giving up.
    pub busy_timeout: Duration,
    pub run_migrations: bool,
}

impl DbConfig {
    /// A file database, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A private database for tests and throwaway runs.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(2),
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::Unavailable(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(self.busy_timeout)
        };

        // bookings.quote_id REFERENCES quotes(id)
        Ok(options.foreign_keys(true))
    }
}

/// Shared handle to the TripDesk database. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations unless disabled.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let options = config.connect_options()?;

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout);
        if config.is_in_memory() {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;

        info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            "TripDesk database opened"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        debug!("Schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn quotes(&self) -> SqliteQuoteRepository {
        SqliteQuoteRepository::new(self.pool.clone())
    }

    pub fn bookings(&self) -> SqliteBookingRepository {
        SqliteBookingRepository::new(self.pool.clone())
    }

    pub fn wallets(&self) -> SqliteWalletRepository {
        SqliteWalletRepository::new(self.pool.clone())
    }

    pub fn audit_log(&self) -> SqliteAuditLog {
        SqliteAuditLog::new(self.pool.clone())
    }

    pub fn receipt_sequences(&self) -> SqliteReceiptSequence {
        SqliteReceiptSequence::new(self.pool.clone())
    }

    /// Waits for checked-out connections, then closes. Handles fail afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("TripDesk database closed");
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_database_has_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_skipping_migrations_leaves_no_tables() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        assert!(!db.health_check().await);

        db.run_migrations().await.unwrap();
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_closed_database_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_in_memory_uses_one_connection() {
        let memory = DbConfig::in_memory();
        assert!(memory.is_in_memory());
        assert_eq!(memory.max_connections, 1);

        let file = DbConfig::new("/tmp/tripdesk.db").max_connections(8);
        assert!(!file.is_in_memory());
        assert_eq!(file.max_connections, 8);
        assert!(file.run_migrations);
    }
}

//! Database module for logingate.
//!
//! This module owns the connection pool, applies migrations and exposes
//! the account model, row codec and [`AccountStore`].

mod account;
pub mod codec;
mod repository;
mod schema;

pub use account::{Account, AccountSnapshot};
pub use codec::{AccountCodec, AccountRow, StoredTimestamp};
pub use repository::AccountStore;
pub use schema::MIGRATIONS;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::{GateError, Result};

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable either the `sqlite` or the `postgres` feature");

/// Connection pool type for the selected backend.
#[cfg(feature = "sqlite")]
pub type DbPool = sqlx::SqlitePool;
/// Row type for the selected backend.
#[cfg(feature = "sqlite")]
pub type DbRow = sqlx::sqlite::SqliteRow;
/// The selected sqlx backend.
#[cfg(feature = "sqlite")]
pub type DbBackend = sqlx::Sqlite;

/// Connection pool type for the selected backend.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbPool = sqlx::PgPool;
/// Row type for the selected backend.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbRow = sqlx::postgres::PgRow;
/// The selected sqlx backend.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbBackend = sqlx::Postgres;

/// How the `last_login` column is represented in the backend.
///
/// This is a property of the deployment and never changes while a
/// [`Database`] is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// Native temporal column, decoded directly.
    Native,
    /// `yyyy-MM-dd HH:mm:ss` text interpreted as UTC.
    Text,
}

impl TimestampMode {
    /// Default mode for the compiled-in backend.
    ///
    /// SQLite fills `CURRENT_TIMESTAMP` defaults with plain text, so it
    /// uses text mode.
    pub fn backend_default() -> Self {
        if cfg!(feature = "sqlite") {
            TimestampMode::Text
        } else {
            TimestampMode::Native
        }
    }

    /// Whether the compiled-in backend schema can hold this mode.
    pub fn supported_by_backend(self) -> bool {
        // The PostgreSQL schema declares TIMESTAMPTZ, which rejects text binds.
        cfg!(feature = "sqlite") || self == TimestampMode::Native
    }
}

/// Database wrapper owning the connection pool.
pub struct Database {
    pool: DbPool,
    timestamp_mode: TimestampMode,
}

impl Database {
    /// Connect using the `[database]` configuration and apply migrations.
    #[cfg(feature = "sqlite")]
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        use std::str::FromStr;
        use std::time::Duration;

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| GateError::DatabaseConnection(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // Create parent directories if they don't exist
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening database at {:?}", options.get_filename());
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| GateError::DatabaseConnection(e.to_string()))?;

        Self::with_pool(pool, config.effective_timestamp_mode()).await
    }

    /// Connect using the `[database]` configuration and apply migrations.
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        use sqlx::postgres::PgPoolOptions;

        info!("Opening PostgreSQL database");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| GateError::DatabaseConnection(e.to_string()))?;

        Self::with_pool(pool, config.effective_timestamp_mode()).await
    }

    /// Open an in-memory database for testing, using the backend default
    /// timestamp mode.
    #[cfg(feature = "sqlite")]
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_mode(TimestampMode::backend_default()).await
    }

    /// Open an in-memory database for testing with an explicit timestamp mode.
    #[cfg(feature = "sqlite")]
    pub async fn open_in_memory_with_mode(mode: TimestampMode) -> Result<Self> {
        use sqlx::sqlite::SqlitePoolOptions;

        debug!("Opening in-memory database");
        // Every connection to :memory: is a separate database, so keep
        // exactly one alive for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| GateError::DatabaseConnection(e.to_string()))?;

        Self::with_pool(pool, mode).await
    }

    async fn with_pool(pool: DbPool, timestamp_mode: TimestampMode) -> Result<Self> {
        if !timestamp_mode.supported_by_backend() {
            return Err(GateError::Config(format!(
                "timestamp mode {timestamp_mode:?} is not supported by this backend"
            )));
        }

        let db = Self {
            pool,
            timestamp_mode,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Timestamp mode fixed for this deployment.
    pub fn timestamp_mode(&self) -> TimestampMode {
        self.timestamp_mode
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        sqlx::query(schema::SCHEMA_VERSION_TABLE)
            .execute(&self.pool)
            .await?;

        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;

        Ok(version)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        let current_version = self.schema_version().await?;

        if current_version as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating database from version {} to {}",
            current_version,
            MIGRATIONS.len()
        );

        // Apply each pending migration in a transaction
        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            info!("Applying migration v{}", version);

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            debug!("Migration v{} applied successfully", version);
        }

        info!(
            "Database migration complete (now at version {})",
            MIGRATIONS.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("timestamp_mode", &self.timestamp_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    async fn table_exists(db: &Database, name: &str) -> bool {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=$1)",
        )
        .bind(name)
        .fetch_one(db.pool())
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
        assert_eq!(db.timestamp_mode(), TimestampMode::Text);
    }

    #[tokio::test]
    async fn test_accounts_table_exists() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(table_exists(&db, "accounts").await);
        assert!(table_exists(&db, "schema_version").await);
        assert!(!table_exists(&db, "nonexistent").await);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_default_last_login_is_text_pattern() {
        let db = Database::open_in_memory().await.unwrap();

        sqlx::query("INSERT INTO accounts (id, username, password) VALUES ($1, $2, $3)")
            .bind(vec![0u8; 16])
            .bind("Steve")
            .bind("hash")
            .execute(db.pool())
            .await
            .unwrap();

        let stored: String = sqlx::query_scalar("SELECT last_login FROM accounts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert!(crate::datetime::parse_sql_timestamp(&stored).is_ok());
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("accounts.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            ..DatabaseConfig::default()
        };

        {
            let db = Database::open(&config).await.unwrap();
            assert!(table_exists(&db, "accounts").await);
            db.pool().close().await;
        }

        let db = Database::open(&config).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap() as usize, MIGRATIONS.len());
    }

    #[test]
    fn test_backend_default_mode() {
        assert_eq!(TimestampMode::backend_default(), TimestampMode::Text);
        assert!(TimestampMode::Native.supported_by_backend());
        assert!(TimestampMode::Text.supported_by_backend());
    }
}

//! Storage: SQLite-backed stores built on sea-query.
//!
//! Store modules expose `async fn`s over `&mut SqliteConnection` so the
//! same operations run inside a step's transaction or on a plain pool
//! connection. The pipeline holds two independent [`Database`] handles:
//! the working database and the log database, so import-log bookkeeping
//! survives a working-transaction rollback.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

pub mod audit_store;
pub mod claim_store;
pub mod employee_store;
pub mod extract_store;
pub mod helpers;
pub mod import_log_store;
pub mod payment_store;
pub mod reference_file_store;
pub mod schema;
pub mod state_log_store;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("invalid uuid in column {column}: {value}")]
    InvalidUuid { column: &'static str, value: String },

    #[error("unknown {kind} value in database: {value}")]
    UnknownEnumValue { kind: &'static str, value: String },

    #[error("invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },

    #[error("invalid date in column {column}: {value}")]
    InvalidDate { column: &'static str, value: String },

    #[error("invalid decimal in column {column}: {value}")]
    InvalidDecimal { column: &'static str, value: String },

    #[error("state log {state_log_id} has {count} associated entities, expected at most one")]
    AmbiguousEntity { state_log_id: i64, count: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Connection pool wrapper with schema management.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to a database URL, e.g. `sqlite:leavepay.db?mode=rwc`.
    pub async fn connect(url: &str) -> Result<Database> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        info!(url, "connected to database");
        Ok(Database { pool })
    }

    /// In-memory database on a single shared connection, for tests.
    pub async fn connect_in_memory() -> Result<Database> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Database { pool })
    }

    /// Create all pipeline tables if they do not exist.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in schema::CREATE_ALL {
            sqlx::raw_sql(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

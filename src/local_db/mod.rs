//! # Local Cache Store
//!
//! Durable, per-entity-type storage on the device, backed by SQLite. This
//! is the offline half of every synchronized collection: records are
//! cached here as JSON field maps keyed by their client-generated id, and
//! writes that cannot reach the remote store land in the pending-operations
//! queue until a sync pass drains them.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool and schema management
//! - `records.rs`: keyed record storage (`get_all`, `get`, `save`, `remove`)
//! - `queue.rs`: the pending-operations queue (`enqueue`, FIFO snapshot,
//!   `dequeue`)
//! - `schema.sql`: table definitions
//!
//! Initialization is lazy and idempotent: opening the database creates any
//! missing tables, and record operations against an unknown (but well
//! formed) table name create that table on first use. No network I/O
//! happens anywhere in this module.

pub mod queue;
pub mod records;
mod schema;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::shared::error::LocalStoreError;

/// Result type for local store operations
pub type Result<T> = std::result::Result<T, LocalStoreError>;

/// Local cache database.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct LocalDatabase {
    pool: SqlitePool,
    known_tables: RwLock<HashSet<String>>,
}

impl LocalDatabase {
    /// Open or create the database at the platform data directory.
    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_path()).await
    }

    /// Open or create the database at `path` and initialize the schema.
    ///
    /// Uses WAL mode for better concurrency.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LocalStoreError::Storage(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        let db = Self {
            pool,
            known_tables: RwLock::new(HashSet::new()),
        };
        db.init_schema().await?;
        Ok(db)
    }

    /// Platform-specific default database path.
    fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("bandbrain");
        path.push("cache.db");
        path
    }

    /// Create tables and record the schema version.
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current: (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;

        if current.0 < schema::CURRENT_SCHEMA_VERSION {
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(schema::CURRENT_SCHEMA_VERSION)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Connection pool reference, for callers that need raw access.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Validate a table identifier and create the table if it is missing.
    ///
    /// Table names are data here (they arrive as strings from queue
    /// entries), so they are interpolated into DDL/DML and must be locked
    /// down to `[a-z][a-z0-9_]*`.
    pub(crate) async fn ensure_table(&self, table: &str) -> Result<()> {
        if !valid_table_name(table) {
            return Err(LocalStoreError::InvalidTable(table.to_string()));
        }

        {
            let known = self.known_tables.read().expect("known_tables poisoned");
            if known.contains(table) {
                return Ok(());
            }
        }

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id TEXT PRIMARY KEY,
                band_id TEXT NOT NULL DEFAULT '',
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"
        ))
        .execute(&self.pool)
        .await?;

        self.known_tables
            .write()
            .expect("known_tables poisoned")
            .insert(table.to_string());
        Ok(())
    }

    /// Basic statistics for debugging and status displays.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let mut cached_records = 0u64;
        for table in schema::ENTITY_TABLES {
            let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
                .fetch_one(&self.pool)
                .await?;
            cached_records += count.0 as u64;
        }

        let pending: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_ops")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            cached_records,
            pending_operations: pending.0 as u64,
        })
    }

    /// Remove queue entries older than `days_old` days.
    ///
    /// A poisoned entry that can never replay would otherwise sit in the
    /// queue forever and be re-attempted every pass.
    pub async fn cleanup_stale_operations(&self, days_old: i64) -> Result<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(days_old);
        let result = sqlx::query("DELETE FROM pending_ops WHERE enqueued_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// `[a-z][a-z0-9_]*`, the shape of every table identifier we accept.
fn valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Records cached across all entity tables
    pub cached_records: u64,
    /// Entries waiting in the pending-operations queue
    pub pending_operations: u64,
}

#[cfg(test)]
pub(crate) async fn test_db() -> (tempfile::TempDir, LocalDatabase) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = LocalDatabase::open(dir.path().join("cache.db"))
        .await
        .expect("open test db");
    (dir, db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_validation() {
        assert!(valid_table_name("events"));
        assert!(valid_table_name("setlist_songs"));
        assert!(!valid_table_name(""));
        assert!(!valid_table_name("Events"));
        assert!(!valid_table_name("drop table"));
        assert!(!valid_table_name("1events"));
    }

    #[tokio::test]
    async fn open_creates_schema() {
        let (_dir, db) = test_db().await;
        let stats = db.stats().await.unwrap();
        assert_eq!(stats.cached_records, 0);
        assert_eq!(stats.pending_operations, 0);
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        drop(LocalDatabase::open(&path).await.unwrap());
        let db = LocalDatabase::open(&path).await.unwrap();
        assert_eq!(db.stats().await.unwrap().cached_records, 0);
    }

    #[tokio::test]
    async fn ensure_table_rejects_bad_identifiers() {
        let (_dir, db) = test_db().await;
        let err = db.ensure_table("events; DROP TABLE tasks").await.unwrap_err();
        assert!(matches!(err, LocalStoreError::InvalidTable(_)));
    }
}

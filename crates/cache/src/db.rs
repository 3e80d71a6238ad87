//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Ingest and sprite workers run side by side with the HTTP server.
const MAX_CONNECTIONS: u32 = 8;

/// Database connection pool for the mirror.
///
/// This is the main entry point for the resource cache, asset metadata,
/// projections and the work queue. Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Apply the query-based PRAGMAs to EVERY connection instead of
            // only the first connection returned by the pool.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the database at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(options, None).await
    }

    /// Connect to an in-memory database.
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Parallel connections to ":memory:" would each see their own
        // database, so the pool is limited to one connection.
        Self::new(options, Some(1)).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Lease transactions from concurrent workers queue up behind the
            // single WAL writer; give them time before SQLITE_BUSY.
            .busy_timeout(std::time::Duration::from_millis(5000))
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    ///
    /// This is called automatically by `connect` and `connect_in_memory`.
    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// `false` once the pool is closed or the file stops answering queries.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!db.pool().is_closed());
        db.close().await;
    }

    #[tokio::test]
    async fn test_ping_after_close() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(db.ping().await);
        db.close().await;
        assert!(!db.ping().await);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_all_tables_exist() {
        let db = Database::connect_in_memory().await.unwrap();
        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' AND name NOT LIKE 'sqlite%' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        let tables: Vec<_> = tables.into_iter().map(|(name,)| name).collect();
        assert_eq!(tables, ["cached_resources", "mirrored_assets", "pokemon_projections", "queue_messages"]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let db = Database::connect_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1, "foreign_keys should be ON");
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 800, "WAL checkpoint should be 800");
        db.close().await;
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = std::env::temp_dir().join(format!("pokemirror-db-{}", std::process::id()));
        let path = dir.join("nested/cache.sqlite");
        let db = Database::connect(&path).await.unwrap();
        assert!(path.exists());
        db.close().await;
        let _ = std::fs::remove_dir_all(dir);
    }
}

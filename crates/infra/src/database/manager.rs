//! Database connection manager backed by an r2d2 SQLite pool.

use std::path::{Path, PathBuf};

use minuteflow_domain::{MinuteflowError, Result};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Pooled SQLite connection handle.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database manager that wraps an r2d2 pool.
pub struct DbManager {
    pool: r2d2::Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl DbManager {
    /// Create a new manager with the given pool size.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });

        let max_connections = pool_size.max(1);
        let pool = r2d2::Pool::builder()
            .max_size(max_connections)
            .build(manager)
            .map_err(|err| MinuteflowError::Database(err.to_string()))?;

        info!(
            db_path = %path.display(),
            max_connections,
            "sqlite pool initialised"
        );

        Ok(Self { pool, path })
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<PooledConnection> {
        self.pool.get().map_err(|err| MinuteflowError::Database(err.to_string()))
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at)
             VALUES (?, CAST(strftime('%s','now') AS INTEGER))",
            params![SCHEMA_VERSION],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Perform a health check to verify database connectivity.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0)).map_err(map_sql_error)?;
        Ok(())
    }
}

pub(crate) fn map_sql_error(err: rusqlite::Error) -> MinuteflowError {
    MinuteflowError::Database(err.to_string())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn migrations_create_schema_version() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("manager created");
        manager.run_migrations().expect("migrations run");

        let conn = manager.get_connection().expect("connection");
        let version: i32 = conn
            .query_row("SELECT version FROM schema_version", params![], |row| row.get(0))
            .expect("version row");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 2).expect("manager created");
        manager.run_migrations().expect("first run");
        manager.run_migrations().expect("second run");
    }

    #[test]
    fn health_check_succeeds_on_fresh_database() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("health.db");

        let manager = DbManager::new(&db_path, 1).expect("manager created");
        manager.run_migrations().expect("migrations run");
        manager.health_check().expect("healthy");
    }
}

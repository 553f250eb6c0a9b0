//! Bridge database connection pool and initialization.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::{DbError, DbResult},
    sqlite_runtime::create_file_pool,
};

/// Bridge database pool wrapper
#[derive(Debug, Clone)]
pub struct BridgeDbPool {
    pool: SqlitePool,
}

impl BridgeDbPool {
    /// Open the database in the user data directory and run migrations.
    pub async fn new() -> DbResult<Self> {
        let db_path = Self::db_path()?;
        Self::open(&db_path).await
    }

    /// Open (creating if needed) a database file and run migrations.
    pub async fn open(db_path: &Path) -> DbResult<Self> {
        info!("Initializing bridge database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = create_file_pool(db_path, 5).await?;

        Self::run_migrations(&pool).await?;

        info!("Bridge database initialized successfully");
        Ok(Self { pool })
    }

    /// Get the inner SQLx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database file path
    pub fn db_path() -> DbResult<PathBuf> {
        let data_dir = dirs::data_dir().ok_or(DbError::NoConfigDir)?;
        Ok(data_dir.join("tradbridge").join("bridge.sqlite3"))
    }

    pub(crate) async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
        sqlx::migrate!("./migrations/bridge")
            .run(pool)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;

        info!("Bridge database migrations completed");
        Ok(())
    }

    /// Close the pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create a BridgeDbPool from an existing SqlitePool (for testing)
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

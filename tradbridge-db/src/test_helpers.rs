//! Test helpers for the bridge database.

use crate::{bridge_db::BridgeDbPool, error::DbResult, sqlite_runtime::create_in_memory_pool};

/// Create an in-memory bridge database for testing
pub async fn create_test_pool() -> DbResult<BridgeDbPool> {
    let pool = create_in_memory_pool(1).await?;

    BridgeDbPool::run_migrations(&pool).await?;

    Ok(BridgeDbPool::from_pool(pool))
}

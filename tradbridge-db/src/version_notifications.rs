//! Anti-duplicate ledger for version checker alerts.
//!
//! One row per forum thread: the last version an alert was sent for.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;

/// Repository for version_notifications table operations.
pub struct VersionNotificationRepository;

impl VersionNotificationRepository {
    /// Whether an alert was already sent for this exact version.
    pub async fn is_notified(pool: &SqlitePool, thread_id: u64, version: &str) -> DbResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT version FROM version_notifications WHERE thread_id = ?")
                .bind(thread_id.to_string())
                .fetch_optional(pool)
                .await?;

        Ok(row.is_some_and(|(stored,)| stored == version))
    }

    /// Record that an alert was sent for `version`.
    pub async fn mark_notified(pool: &SqlitePool, thread_id: u64, version: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO version_notifications (thread_id, version, notified_at)
             VALUES (?, ?, ?)
             ON CONFLICT(thread_id) DO UPDATE SET
                version = excluded.version,
                notified_at = excluded.notified_at",
        )
        .bind(thread_id.to_string())
        .bind(version)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Forget entries older than `days`. Returns the number removed.
    pub async fn prune_older_than(pool: &SqlitePool, days: i64) -> DbResult<u64> {
        let cutoff = (Utc::now() - Duration::days(days)).timestamp();
        let result = sqlx::query("DELETE FROM version_notifications WHERE notified_at < ?")
            .bind(cutoff)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

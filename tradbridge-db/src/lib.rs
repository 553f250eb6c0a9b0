//! tradbridge-db: SQLite storage for the publisher API history and the
//! version checker's notification ledger.

pub mod bridge_db;
pub mod error;
pub mod published_posts;
mod sqlite_runtime;
pub mod version_notifications;

// Re-export commonly used types
pub use bridge_db::BridgeDbPool;
pub use error::{DbError, DbResult};
pub use published_posts::{NewPublishedPost, PublishedPost, PublishedPostRepository};
pub use version_notifications::VersionNotificationRepository;

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

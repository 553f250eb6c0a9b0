//! History of forum posts created through the publisher API.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};

/// Upper bound on rows returned by [`PublishedPostRepository::list_recent`].
pub const MAX_HISTORY_ROWS: i64 = 1000;

/// A recorded forum post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub thread_id: u64,
    pub message_id: u64,
    pub forum_id: u64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// Raw metadata JSON as sent by the publisher
    pub metadata: Option<String>,
    pub thread_url: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields written on create or update.
#[derive(Debug, Clone)]
pub struct NewPublishedPost<'a> {
    pub thread_id: u64,
    pub message_id: u64,
    pub forum_id: u64,
    pub title: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
    pub metadata: Option<&'a str>,
    pub thread_url: &'a str,
}

/// Repository for published_posts table operations.
pub struct PublishedPostRepository;

impl PublishedPostRepository {
    /// Insert a post, or overwrite the stored one for the same thread.
    ///
    /// `created_at` is kept from the first insert.
    pub async fn upsert(pool: &SqlitePool, post: &NewPublishedPost<'_>) -> DbResult<PublishedPost> {
        let now = Utc::now().timestamp();
        let tags = serde_json::to_string(post.tags)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO published_posts
                (thread_id, message_id, forum_id, title, content, tags, metadata, thread_url, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(thread_id) DO UPDATE SET
                message_id = excluded.message_id,
                forum_id = excluded.forum_id,
                title = excluded.title,
                content = excluded.content,
                tags = excluded.tags,
                metadata = excluded.metadata,
                thread_url = excluded.thread_url,
                updated_at = excluded.updated_at",
        )
        .bind(post.thread_id.to_string())
        .bind(post.message_id.to_string())
        .bind(post.forum_id.to_string())
        .bind(post.title)
        .bind(post.content)
        .bind(&tags)
        .bind(post.metadata)
        .bind(post.thread_url)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::get_by_thread(pool, post.thread_id)
            .await?
            .ok_or_else(|| DbError::Serialization(format!("post {} vanished", post.thread_id)))
    }

    /// Get the recorded post for a thread.
    pub async fn get_by_thread(pool: &SqlitePool, thread_id: u64) -> DbResult<Option<PublishedPost>> {
        let row = sqlx::query_as::<_, PublishedPostRow>(
            "SELECT thread_id, message_id, forum_id, title, content, tags, metadata, thread_url, created_at, updated_at
             FROM published_posts
             WHERE thread_id = ?",
        )
        .bind(thread_id.to_string())
        .fetch_optional(pool)
        .await?;

        row.map(PublishedPost::try_from).transpose()
    }

    /// Most recently updated posts first.
    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> DbResult<Vec<PublishedPost>> {
        let rows = sqlx::query_as::<_, PublishedPostRow>(
            "SELECT thread_id, message_id, forum_id, title, content, tags, metadata, thread_url, created_at, updated_at
             FROM published_posts
             ORDER BY updated_at DESC, created_at DESC
             LIMIT ?",
        )
        .bind(limit.clamp(0, MAX_HISTORY_ROWS))
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(PublishedPost::try_from).collect()
    }

    /// Delete the record for a thread. Returns whether a row existed.
    pub async fn delete_by_thread(pool: &SqlitePool, thread_id: u64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM published_posts WHERE thread_id = ?")
            .bind(thread_id.to_string())
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PublishedPostRow {
    thread_id: String,
    message_id: String,
    forum_id: String,
    title: String,
    content: String,
    tags: String,
    metadata: Option<String>,
    thread_url: String,
    created_at: i64,
    updated_at: i64,
}

fn parse_id(field: &str, value: &str) -> DbResult<u64> {
    value
        .parse()
        .map_err(|_| DbError::Serialization(format!("invalid {field}: {value}")))
}

impl TryFrom<PublishedPostRow> for PublishedPost {
    type Error = DbError;

    fn try_from(row: PublishedPostRow) -> Result<Self, Self::Error> {
        let tags: Vec<String> =
            serde_json::from_str(&row.tags).map_err(|e| DbError::Serialization(e.to_string()))?;

        Ok(PublishedPost {
            thread_id: parse_id("thread_id", &row.thread_id)?,
            message_id: parse_id("message_id", &row.message_id)?,
            forum_id: parse_id("forum_id", &row.forum_id)?,
            title: row.title,
            content: row.content,
            tags,
            metadata: row.metadata,
            thread_url: row.thread_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_pool;

    fn post<'a>(thread_id: u64, title: &'a str, tags: &'a [String]) -> NewPublishedPost<'a> {
        NewPublishedPost {
            thread_id,
            message_id: thread_id,
            forum_id: 10,
            title,
            content: "**Version du jeu :** v1",
            tags,
            metadata: Some(r#"{"game_name":"Jeu"}"#),
            thread_url: "https://discord.com/channels/1/2",
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let tags = vec!["✅ Terminé".to_string()];

        let stored = PublishedPostRepository::upsert(pool, &post(1_234_567_890_123, "Jeu", &tags))
            .await
            .unwrap();
        assert_eq!(stored.thread_id, 1_234_567_890_123);
        assert_eq!(stored.tags, tags);
        assert_eq!(stored.metadata.as_deref(), Some(r#"{"game_name":"Jeu"}"#));

        let fetched = PublishedPostRepository::get_by_thread(pool, 1_234_567_890_123)
            .await
            .unwrap();
        assert_eq!(fetched, Some(stored));
        assert!(
            PublishedPostRepository::get_by_thread(pool, 9)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        let first = PublishedPostRepository::upsert(pool, &post(1, "Avant", &[]))
            .await
            .unwrap();
        let second = PublishedPostRepository::upsert(pool, &post(1, "Après", &[]))
            .await
            .unwrap();

        assert_eq!(second.title, "Après");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(PublishedPostRepository::list_recent(pool, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_thread() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        PublishedPostRepository::upsert(pool, &post(5, "Jeu", &[]))
            .await
            .unwrap();
        assert!(PublishedPostRepository::delete_by_thread(pool, 5).await.unwrap());
        assert!(!PublishedPostRepository::delete_by_thread(pool, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_recent_respects_limit() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();

        for id in 1..=3 {
            PublishedPostRepository::upsert(pool, &post(id, "Jeu", &[]))
                .await
                .unwrap();
        }
        assert_eq!(PublishedPostRepository::list_recent(pool, 2).await.unwrap().len(), 2);
        assert!(PublishedPostRepository::list_recent(pool, 0).await.unwrap().is_empty());
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::domains::posts::machine::PostStatus;

/// A unit of pipelined content-generation work, owned by exactly one caller.
///
/// Every owner-facing query below is a single conditional statement scoped by
/// `id AND owner`, so an ownership mismatch and a missing record are the same
/// outcome (`None` / zero rows) and there is no check-then-write gap to race.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub owner: String,
    pub topic: String,
    pub keywords: String,
    pub outline: Option<Json<serde_json::Value>>,
    pub content: Option<String>,
    pub status: PostStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Owner-scoped operations (request path)
// =============================================================================

impl Post {
    pub async fn create(topic: &str, keywords: &str, owner: &str, pool: &SqlitePool) -> Result<Self> {
        let now = Utc::now();
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO posts (owner, topic, keywords, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(owner)
        .bind(topic)
        .bind(keywords)
        .bind(PostStatus::Researching)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: i64, owner: &str, pool: &SqlitePool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM posts WHERE id = ?1 AND owner = ?2")
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// All posts for an owner, most recently created first.
    pub async fn list_for_owner(owner: &str, pool: &SqlitePool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM posts WHERE owner = ?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(owner)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Case-insensitive substring match against topic or content.
    ///
    /// Uses instr() rather than LIKE so the query needs no wildcard escaping.
    pub async fn search_for_owner(owner: &str, query: &str, pool: &SqlitePool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM posts
            WHERE owner = ?1
              AND (instr(lower(topic), lower(?2)) > 0
                   OR instr(lower(coalesce(content, '')), lower(?2)) > 0)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner)
        .bind(query)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Manual revision: replaces topic and content and marks the post UPDATED.
    pub async fn edit(
        id: i64,
        owner: &str,
        topic: &str,
        content: &str,
        pool: &SqlitePool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE posts
            SET topic = ?3, content = ?4, status = ?5, updated_at = ?6
            WHERE id = ?1 AND owner = ?2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(topic)
        .bind(content)
        .bind(PostStatus::Updated)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Sets the publish timestamp and marks the post SCHEDULED.
    ///
    /// Scheduling is orthogonal to pipeline progress; outline and content
    /// survive, only the display status is overwritten.
    pub async fn schedule(
        id: i64,
        owner: &str,
        scheduled_at: DateTime<Utc>,
        pool: &SqlitePool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE posts
            SET scheduled_at = ?3, status = ?4, updated_at = ?5
            WHERE id = ?1 AND owner = ?2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(scheduled_at)
        .bind(PostStatus::Scheduled)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn delete(id: i64, owner: &str, pool: &SqlitePool) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM posts WHERE id = ?1 AND owner = ?2")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Atomically flips an eligible post to WRITING.
    ///
    /// Eligible means OUTLINE_READY, or ERROR with an outline to retry from.
    /// Two racing triggers both run this statement but only one sees a row;
    /// the loser observes `None` and no second stage execution starts.
    pub async fn claim_for_writing(id: i64, owner: &str, pool: &SqlitePool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE posts
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND owner = ?2
              AND status IN (?5, ?6)
              AND outline IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(PostStatus::Writing)
        .bind(Utc::now())
        .bind(PostStatus::OutlineReady)
        .bind(PostStatus::Error)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Atomically re-enters RESEARCHING from a research-stage failure.
    pub async fn claim_for_research(id: i64, owner: &str, pool: &SqlitePool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE posts
            SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND owner = ?2
              AND status = ?5
              AND outline IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(PostStatus::Researching)
        .bind(Utc::now())
        .bind(PostStatus::Error)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}

// =============================================================================
// Stage-executor writes (background path, keyed by id only)
// =============================================================================
//
// The executor inherits ownership from the trigger that dispatched it, so
// these statements gate on the expected pipeline status instead: if the user
// edited or deleted the post while the stage was in flight, zero rows match
// and the stale result is dropped.

impl Post {
    /// Internal read for a stage execution (no owner scope).
    pub async fn find_for_stage(id: i64, pool: &SqlitePool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM posts WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Research stage success: store the outline, move to OUTLINE_READY.
    pub async fn set_outline_ready(
        id: i64,
        outline: &serde_json::Value,
        pool: &SqlitePool,
    ) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE posts
            SET outline = ?2, status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(id)
        .bind(Json(outline))
        .bind(PostStatus::OutlineReady)
        .bind(Utc::now())
        .bind(PostStatus::Researching)
        .execute(pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Writing stage success: store the content, move to PUBLISHED.
    pub async fn set_published(id: i64, content: &str, pool: &SqlitePool) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE posts
            SET content = ?2, status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(PostStatus::Published)
        .bind(Utc::now())
        .bind(PostStatus::Writing)
        .execute(pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Stage failure: mark ERROR. Applies to both stage statuses, so a
    /// writing failure is never left stranded in WRITING.
    pub async fn set_error(id: i64, pool: &SqlitePool) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE posts
            SET status = ?2, updated_at = ?3
            WHERE id = ?1 AND status IN (?4, ?5)
            "#,
        )
        .bind(id)
        .bind(PostStatus::Error)
        .bind(Utc::now())
        .bind(PostStatus::Researching)
        .bind(PostStatus::Writing)
        .execute(pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }
}

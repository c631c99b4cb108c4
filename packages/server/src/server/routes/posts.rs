//! Blog post endpoints.
//!
//! Stage triggers (create, generate, retry) flip the post's status with a
//! single atomic conditional update and hand the post to the stage executor;
//! they return before any collaborator work happens. Stage failures are not
//! surfaced here; callers observe them by polling status.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domains::posts::{Post, PostData, PostStatus};
use crate::kernel::{OriginalityReport, Stage};
use crate::server::app::AppState;
use crate::server::auth::OwnerId;
use crate::server::error::ApiError;

// =============================================================================
// Request / response schemas
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub topic: String,
    pub keywords: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostResponse {
    pub post_id: i64,
    pub status: PostStatus,
}

#[derive(Debug, Deserialize)]
pub struct EditPostRequest {
    pub topic: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SchedulePostRequest {
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    #[serde(default)]
    pub user_context: String,
    #[serde(default = "default_tone")]
    pub tone: String,
}

fn default_tone() -> String {
    "balanced".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResponse {
    pub rewritten_content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub status: PostStatus,
}

// =============================================================================
// Handlers
// =============================================================================

/// Creates a post entry and triggers research in the background.
pub async fn create_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Json(req): Json<CreatePostRequest>,
) -> Result<Json<CreatePostResponse>, ApiError> {
    let topic = req.topic.trim();
    let keywords = req.keywords.trim();
    if topic.is_empty() || keywords.is_empty() {
        return Err(ApiError::InvalidInput(
            "topic and keywords are required".to_string(),
        ));
    }

    let post = Post::create(topic, keywords, &owner, &state.db_pool).await?;
    tracing::info!(post_id = post.id, "post created; triggering research stage");

    let status = match state.executor.dispatch(post.id, Stage::Research) {
        Ok(()) => post.status,
        Err(e) => {
            // Credentials missing at startup: flag the post instead of leaving
            // it in RESEARCHING with no stage ever coming.
            tracing::warn!(post_id = post.id, error = %e, "research dispatch refused");
            Post::set_error(post.id, &state.db_pool).await?;
            PostStatus::Error
        }
    };

    Ok(Json(CreatePostResponse {
        post_id: post.id,
        status,
    }))
}

pub async fn get_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
) -> Result<Json<PostData>, ApiError> {
    let post = Post::find_by_id(id, &owner, &state.db_pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(post.into()))
}

pub async fn list_posts(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
) -> Result<Json<Vec<PostData>>, ApiError> {
    let posts = Post::list_for_owner(&owner, &state.db_pool).await?;
    Ok(Json(posts.into_iter().map(Into::into).collect()))
}

pub async fn search_posts(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PostData>>, ApiError> {
    let query = params.q.trim();
    let posts = if query.is_empty() {
        Post::list_for_owner(&owner, &state.db_pool).await?
    } else {
        Post::search_for_owner(&owner, query, &state.db_pool).await?
    };
    Ok(Json(posts.into_iter().map(Into::into).collect()))
}

/// Triggers the full content generation phase after outline approval.
pub async fn trigger_generate(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Reserve the execution slot before claiming. The other order can strand
    // the row: a claim flips it to WRITING, and if the slot is then refused
    // no execution ever finishes that status.
    let reservation = state.executor.reserve(id)?;

    // Atomic claim: of two racing triggers exactly one flips the row to
    // WRITING; the other lands in the error arm below.
    if Post::claim_for_writing(id, &owner, &state.db_pool).await?.is_none() {
        return match Post::find_by_id(id, &owner, &state.db_pool).await? {
            None => Err(ApiError::NotFound),
            Some(p) => Err(ApiError::Conflict(format!(
                "post is not ready for generation (status {})",
                p.status
            ))),
        };
    }

    reservation.start(Stage::Writing);

    Ok(Json(MessageResponse {
        message: "Generation started".to_string(),
        status: PostStatus::Writing,
    }))
}

/// Manual revision: persists topic and content, marks the post UPDATED.
pub async fn edit_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
    Json(req): Json<EditPostRequest>,
) -> Result<Json<PostData>, ApiError> {
    let topic = req.topic.trim();
    let content = req.content.trim();
    if topic.is_empty() || content.is_empty() {
        return Err(ApiError::InvalidInput(
            "topic and content are required".to_string(),
        ));
    }

    let post = Post::edit(id, &owner, topic, content, &state.db_pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(post.into()))
}

pub async fn schedule_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
    Json(req): Json<SchedulePostRequest>,
) -> Result<Json<PostData>, ApiError> {
    let post = Post::schedule(id, &owner, req.scheduled_at, &state.db_pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(post.into()))
}

pub async fn delete_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !Post::delete(id, &owner, &state.db_pool).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "message": "Post deleted" })))
}

/// Scores the post's content for originality. The report is returned to the
/// caller and never persisted.
pub async fn analyze_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
) -> Result<Json<OriginalityReport>, ApiError> {
    let service = state.content.clone().ok_or(ApiError::StageDisabled)?;

    let post = Post::find_by_id(id, &owner, &state.db_pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    let content = post.content.as_deref().filter(|c| !c.trim().is_empty()).ok_or_else(|| {
        ApiError::InvalidInput("post has no content to analyze".to_string())
    })?;

    let report = service
        .analyze_originality(content)
        .await
        .map_err(ApiError::Upstream)?;
    Ok(Json(report))
}

/// Rewrites the post's content toward a requested tone. Returned to the
/// caller for review; the stored content is untouched.
pub async fn rewrite_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<RewriteResponse>, ApiError> {
    let service = state.content.clone().ok_or(ApiError::StageDisabled)?;

    let post = Post::find_by_id(id, &owner, &state.db_pool)
        .await?
        .ok_or(ApiError::NotFound)?;
    let content = post.content.as_deref().filter(|c| !c.trim().is_empty()).ok_or_else(|| {
        ApiError::InvalidInput("post has no content to rewrite".to_string())
    })?;

    let rewritten = service
        .rewrite_content(content, &req.user_context, &req.tone)
        .await
        .map_err(ApiError::Upstream)?;
    Ok(Json(RewriteResponse {
        rewritten_content: rewritten,
    }))
}

/// Re-triggers the stage that failed: research when the outline is still
/// missing, writing otherwise.
pub async fn retry_post(
    Extension(state): Extension<AppState>,
    OwnerId(owner): OwnerId,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Slot first, claim second; see trigger_generate.
    let reservation = state.executor.reserve(id)?;

    if Post::claim_for_research(id, &owner, &state.db_pool).await?.is_some() {
        reservation.start(Stage::Research);
        return Ok(Json(MessageResponse {
            message: "Research restarted".to_string(),
            status: PostStatus::Researching,
        }));
    }

    if Post::claim_for_writing(id, &owner, &state.db_pool).await?.is_some() {
        reservation.start(Stage::Writing);
        return Ok(Json(MessageResponse {
            message: "Generation restarted".to_string(),
            status: PostStatus::Writing,
        }));
    }

    match Post::find_by_id(id, &owner, &state.db_pool).await? {
        None => Err(ApiError::NotFound),
        Some(p) => Err(ApiError::Conflict(format!(
            "post is not in a retryable state (status {})",
            p.status
        ))),
    }
}

//! HTTP surface: status codes, error body shape, and header auth, exercised
//! through the real router with a scripted content service behind it.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use server_core::domains::posts::{Post, PostStatus};
use server_core::kernel::{StageExecutor, StageExecutorConfig};
use server_core::server::{build_router, AppState};

use common::{setup_pool, test_executor, wait_for_status, MockContentService};

async fn test_app() -> (Router, sqlx::SqlitePool) {
    let pool = setup_pool().await;
    let service = Arc::new(MockContentService::default());
    let executor = test_executor(pool.clone(), service.clone());
    let state = AppState {
        db_pool: pool.clone(),
        content: Some(service),
        executor,
    };
    (build_router(state, vec![]), pool)
}

/// Router with no content service: stage execution disabled.
async fn disabled_app() -> (Router, sqlx::SqlitePool) {
    let pool = setup_pool().await;
    let executor = Arc::new(StageExecutor::new(
        pool.clone(),
        None,
        StageExecutorConfig::default(),
    ));
    let state = AppState {
        db_pool: pool.clone(),
        content: None,
        executor,
    };
    (build_router(state, vec![]), pool)
}

fn request(method: &str, uri: &str, owner: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("x-user-id", owner);
    }
    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_user_header_is_unauthenticated() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(request("GET", "/api/blog-posts", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["detail"], "missing x-user-id header");
}

#[tokio::test]
async fn create_rejects_blank_topic() {
    let (app, _pool) = test_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/blog-posts",
            Some("u1"),
            Some(serde_json::json!({ "topic": "   ", "keywords": "pets" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_returns_id_and_runs_the_research_stage() {
    let (app, pool) = test_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/blog-posts",
            Some("u1"),
            Some(serde_json::json!({ "topic": "Cats", "keywords": "pets,cute" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["postId"], 1);
    assert_eq!(body["status"], "RESEARCHING");

    wait_for_status(&pool, 1, PostStatus::OutlineReady).await;
}

#[tokio::test]
async fn missing_and_foreign_posts_get_the_same_not_found() {
    let (app, pool) = test_app().await;
    let post = Post::create("Cats", "pets", "u1", &pool).await.unwrap();

    let foreign = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/blog-posts/{}", post.id),
            Some("u2"),
            None,
        ))
        .await
        .unwrap();
    let missing = app
        .oneshot(request("GET", "/api/blog-posts/999", Some("u1"), None))
        .await
        .unwrap();

    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(foreign).await, json_body(missing).await);
}

#[tokio::test]
async fn generate_before_outline_is_a_conflict() {
    let (app, pool) = test_app().await;
    let post = Post::create("Cats", "pets", "u1", &pool).await.unwrap();

    let response = app
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/generate", post.id),
            Some("u1"),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("not ready for generation"));
}

#[tokio::test]
async fn generate_against_a_held_slot_never_claims_the_row() {
    let pool = setup_pool().await;
    let service = Arc::new(MockContentService::default());
    let executor = test_executor(pool.clone(), service.clone());
    let state = AppState {
        db_pool: pool.clone(),
        content: Some(service),
        executor: executor.clone(),
    };
    let app = build_router(state, vec![]);

    let post = Post::create("Cats", "pets,cute", "u1", &pool).await.unwrap();
    let outline = serde_json::json!({ "sections": [] });
    assert!(Post::set_outline_ready(post.id, &outline, &pool).await.unwrap());

    // A research execution has committed its write but not yet released its
    // slot; a generate trigger arriving in that window must be refused
    // before it claims the row, or the post is stuck WRITING forever.
    let held = executor.reserve(post.id).unwrap();

    let refused = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/generate", post.id),
            Some("u1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(refused.status(), StatusCode::CONFLICT);

    let stored = Post::find_by_id(post.id, "u1", &pool).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::OutlineReady);

    // Once the slot frees, the same trigger goes through.
    drop(held);
    let accepted = app
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/generate", post.id),
            Some("u1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    wait_for_status(&pool, post.id, PostStatus::Published).await;
}

#[tokio::test]
async fn analyze_requires_content_and_reports_camel_case() {
    let (app, pool) = test_app().await;
    let post = Post::create("Cats", "pets", "u1", &pool).await.unwrap();

    let empty = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/analyze", post.id),
            Some("u1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    Post::edit(post.id, "u1", "Cats", "Some prose.", &pool)
        .await
        .unwrap()
        .unwrap();
    let scored = app
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/analyze", post.id),
            Some("u1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(scored.status(), StatusCode::OK);
    let body = json_body(scored).await;
    assert_eq!(body["score"], 12);
    assert_eq!(body["riskLevel"], "low");
    assert!(body["summary"].is_string());
}

#[tokio::test]
async fn rewrite_returns_text_without_persisting_it() {
    let (app, pool) = test_app().await;
    let post = Post::create("Cats", "pets", "u1", &pool).await.unwrap();
    Post::edit(post.id, "u1", "Cats", "Original prose.", &pool)
        .await
        .unwrap()
        .unwrap();

    let response = app
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/rewrite", post.id),
            Some("u1"),
            Some(serde_json::json!({ "user_context": "", "tone": "casual" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["rewrittenContent"], "rewritten: Original prose.");

    let stored = Post::find_by_id(post.id, "u1", &pool).await.unwrap().unwrap();
    assert_eq!(stored.content.as_deref(), Some("Original prose."));
}

#[tokio::test]
async fn disabled_stages_return_service_unavailable() {
    let (app, pool) = disabled_app().await;
    let post = Post::create("Cats", "pets", "u1", &pool).await.unwrap();

    let generate = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/generate", post.id),
            Some("u1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(generate.status(), StatusCode::SERVICE_UNAVAILABLE);

    Post::edit(post.id, "u1", "Cats", "Some prose.", &pool)
        .await
        .unwrap()
        .unwrap();
    let analyze = app
        .oneshot(request(
            "POST",
            &format!("/api/blog-posts/{}/analyze", post.id),
            Some("u1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(analyze.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn create_without_stage_executor_flags_the_post() {
    let (app, pool) = disabled_app().await;

    let response = app
        .oneshot(request(
            "POST",
            "/api/blog-posts",
            Some("u1"),
            Some(serde_json::json!({ "topic": "Cats", "keywords": "pets" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ERROR");

    let stored = Post::find_by_id(1, "u1", &pool).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Error);
}

#[tokio::test]
async fn health_reports_database_and_stage_state() {
    let (app, _pool) = disabled_app().await;

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "ok");
    assert_eq!(body["stages"], "disabled");
}

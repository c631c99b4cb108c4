//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::kernel::{
    BaseContentService, LlmContentService, OpenAIClient, StageExecutor, StageExecutorConfig,
    TavilyClient,
};
use crate::server::routes::{
    analyze_post, create_post, delete_post, edit_post, get_post, health_handler, list_posts,
    retry_post, rewrite_post, schedule_post, search_posts, trigger_generate,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    /// Present only when collaborator credentials were configured.
    pub content: Option<Arc<dyn BaseContentService>>,
    pub executor: Arc<StageExecutor>,
}

/// Build the content service from collaborator credentials, if both are set.
///
/// Missing credentials disable stage execution but never prevent startup:
/// the service keeps serving reads (StartupConfigurationError policy).
fn build_content_service(
    openai_api_key: Option<String>,
    tavily_api_key: Option<String>,
) -> Option<Arc<dyn BaseContentService>> {
    let (openai_key, tavily_key) = match (openai_api_key, tavily_api_key) {
        (Some(o), Some(t)) => (o, t),
        _ => {
            tracing::warn!(
                "OPENAI_API_KEY and/or TAVILY_API_KEY not set; stage execution disabled"
            );
            return None;
        }
    };

    match TavilyClient::new(tavily_key) {
        Ok(tavily) => {
            let ai = Arc::new(OpenAIClient::new(openai_key));
            Some(Arc::new(LlmContentService::new(ai, Arc::new(tavily))))
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to build search client; stage execution disabled");
            None
        }
    }
}

/// Build the Axum application router from ready-made state.
///
/// Split out from [`build_app`] so tests can inject doubles for the
/// content service and executor.
pub fn build_router(state: AppState, allowed_origins: Vec<String>) -> Router {
    let x_user_id = HeaderName::from_static("x-user-id");

    let cors = {
        let base = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, x_user_id]);

        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if origins.is_empty() {
            base.allow_origin(Any)
        } else {
            base.allow_origin(origins).allow_credentials(true)
        }
    };

    Router::new()
        .route("/api/blog-posts", post(create_post).get(list_posts))
        .route("/api/blog-posts/search", get(search_posts))
        .route(
            "/api/blog-posts/:id",
            get(get_post).put(edit_post).delete(delete_post),
        )
        .route("/api/blog-posts/:id/generate", post(trigger_generate))
        .route("/api/blog-posts/:id/schedule", put(schedule_post))
        .route("/api/blog-posts/:id/analyze", post(analyze_post))
        .route("/api/blog-posts/:id/rewrite", post(rewrite_post))
        .route("/api/blog-posts/:id/retry", post(retry_post))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the full application: collaborator clients, stage executor, router.
pub fn build_app(
    pool: SqlitePool,
    openai_api_key: Option<String>,
    tavily_api_key: Option<String>,
    allowed_origins: Vec<String>,
) -> Router {
    let content = build_content_service(openai_api_key, tavily_api_key);

    let executor = Arc::new(StageExecutor::new(
        pool.clone(),
        content.clone(),
        StageExecutorConfig::default(),
    ));

    let state = AppState {
        db_pool: pool,
        content,
        executor,
    };

    build_router(state, allowed_origins)
}

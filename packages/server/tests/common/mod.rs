//! Shared test harness: in-memory SQLite plus a scripted content service.
//!
//! The content service trait seam exists so tests can observe exactly how
//! many collaborator calls a stage made and script their outcomes.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use server_core::domains::posts::{Post, PostStatus};
use server_core::kernel::{
    BaseContentService, OriginalityReport, StageExecutor, StageExecutorConfig,
};

/// Fresh in-memory database with migrations applied.
///
/// A single pooled connection keeps every query on the same in-memory
/// database; contention is handled by the pool's acquire queue.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(20))
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite should connect");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations should apply");

    pool
}

/// Scripted stand-in for the external content service.
pub struct MockContentService {
    pub outline: serde_json::Value,
    pub content: String,
    pub fail_research: bool,
    pub fail_writing: bool,
    /// Simulated collaborator latency, applied to research and writing.
    pub delay: Option<Duration>,
    pub research_calls: AtomicUsize,
    pub writing_calls: AtomicUsize,
}

impl Default for MockContentService {
    fn default() -> Self {
        Self {
            outline: serde_json::json!({
                "sections": [ { "heading": "Intro", "points": ["p1"] } ]
            }),
            content: "Full post text.".to_string(),
            fail_research: false,
            fail_writing: false,
            delay: None,
            research_calls: AtomicUsize::new(0),
            writing_calls: AtomicUsize::new(0),
        }
    }
}

impl MockContentService {
    pub fn failing_research() -> Self {
        Self {
            fail_research: true,
            ..Self::default()
        }
    }

    pub fn failing_writing() -> Self {
        Self {
            fail_writing: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl BaseContentService for MockContentService {
    async fn research_outline(&self, _topic: &str, _keywords: &str) -> Result<serde_json::Value> {
        self.research_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_research {
            anyhow::bail!("scripted research failure");
        }
        Ok(self.outline.clone())
    }

    async fn generate_content(&self, _topic: &str, _outline: &serde_json::Value) -> Result<String> {
        self.writing_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writing {
            anyhow::bail!("scripted writing failure");
        }
        Ok(self.content.clone())
    }

    async fn analyze_originality(&self, _content: &str) -> Result<OriginalityReport> {
        Ok(OriginalityReport {
            score: 12,
            risk_level: "low".to_string(),
            summary: "reads naturally".to_string(),
        })
    }

    async fn rewrite_content(&self, content: &str, _user_context: &str, _tone: &str) -> Result<String> {
        Ok(format!("rewritten: {content}"))
    }
}

/// Executor with a short timeout suitable for tests.
pub fn test_executor(pool: SqlitePool, service: Arc<MockContentService>) -> Arc<StageExecutor> {
    test_executor_with_config(
        pool,
        service,
        StageExecutorConfig {
            stage_timeout: Duration::from_secs(5),
            max_attempts: 2,
        },
    )
}

pub fn test_executor_with_config(
    pool: SqlitePool,
    service: Arc<MockContentService>,
    config: StageExecutorConfig,
) -> Arc<StageExecutor> {
    Arc::new(StageExecutor::new(
        pool,
        Some(service as Arc<dyn BaseContentService>),
        config,
    ))
}

/// Polls until the post reaches `status`, panicking after two seconds.
/// Callers poll rather than assume synchronous stage completion.
pub async fn wait_for_status(pool: &SqlitePool, id: i64, status: PostStatus) -> Post {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let post = Post::find_for_stage(id, pool)
            .await
            .expect("status poll should not fail")
            .expect("post should exist");
        if post.status == status {
            return post;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "post {id} never reached {status}; still {}",
                post.status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

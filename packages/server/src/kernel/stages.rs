//! Background stage executor.
//!
//! Runs one pipeline stage (research or writing) per invocation, off the
//! request path, and terminates in exactly one store write: outline/content
//! plus a success status, or ERROR. Callers observe progress by polling the
//! post's status; nothing about a stage outcome is returned to the trigger.
//!
//! Guarantees beyond a plain fire-and-forget spawn:
//! - per-post exclusivity: an in-flight set rejects a second dispatch while
//!   one execution is running, on top of the atomic status claims the
//!   triggers already perform
//! - a bounded execution timeout, so a collaborator that never returns
//!   cannot leave a post in RESEARCHING/WRITING forever
//! - a small fixed attempt budget for transient collaborator failures,
//!   after which the post is marked ERROR; further retries are user-driven

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domains::posts::Post;

use super::BaseContentService;

/// One unit of pipeline work. Stage inputs are read from the post row at
/// execution time, so an edit landing before the stage starts is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Research,
    Writing,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Writing => "writing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageExecutorConfig {
    /// Hard cap on a single stage execution, collaborator call included.
    pub stage_timeout: Duration,
    /// Collaborator attempts per invocation before the post is marked ERROR.
    pub max_attempts: u32,
}

impl Default for StageExecutorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(120),
            max_attempts: 2,
        }
    }
}

/// Why a dispatch was refused. Surfaced synchronously to the trigger.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("content generation is disabled: missing collaborator credentials")]
    StageDisabled,
    #[error("a stage is already running for post {0}")]
    StageInFlight(i64),
}

/// How a finished stage execution resolved against the store.
enum StageOutcome {
    Applied,
    /// The post was edited, re-scheduled, or deleted while the stage ran;
    /// the stale result was dropped without a write.
    Superseded,
}

pub struct StageExecutor {
    pool: SqlitePool,
    content: Option<Arc<dyn BaseContentService>>,
    config: StageExecutorConfig,
    in_flight: Mutex<HashSet<i64>>,
}

impl StageExecutor {
    pub fn new(
        pool: SqlitePool,
        content: Option<Arc<dyn BaseContentService>>,
        config: StageExecutorConfig,
    ) -> Self {
        if content.is_none() {
            warn!("no content service configured; stage execution is disabled");
        }
        Self {
            pool,
            content,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether stage execution is available (collaborator credentials present).
    pub fn is_enabled(&self) -> bool {
        self.content.is_some()
    }

    /// Schedule a stage execution for a post and return immediately.
    ///
    /// At most one execution per post id is in flight at any time; a second
    /// dispatch gets `StageInFlight` and no collaborator call is made.
    pub fn dispatch(self: &Arc<Self>, post_id: i64, stage: Stage) -> Result<(), DispatchError> {
        self.reserve(post_id)?.start(stage);
        Ok(())
    }

    /// Reserve the post's execution slot ahead of a status claim.
    ///
    /// Triggers that pair a status claim with a dispatch must reserve first:
    /// claiming and only then being refused the slot would leave the row in
    /// a stage status with no execution to finish it. A reservation dropped
    /// without [`StageReservation::start`] frees the slot.
    pub fn reserve(self: &Arc<Self>, post_id: i64) -> Result<StageReservation, DispatchError> {
        if self.content.is_none() {
            return Err(DispatchError::StageDisabled);
        }
        let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
        if !in_flight.insert(post_id) {
            return Err(DispatchError::StageInFlight(post_id));
        }
        Ok(StageReservation {
            executor: Arc::clone(self),
            post_id,
            started: false,
        })
    }

    fn release(&self, post_id: i64) {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(&post_id);
    }

    /// Drive one dispatched stage to a terminal status.
    async fn run(
        &self,
        content: Arc<dyn BaseContentService>,
        post_id: i64,
        stage: Stage,
        execution_id: Uuid,
    ) {
        for attempt in 1..=self.config.max_attempts {
            let outcome = tokio::time::timeout(
                self.config.stage_timeout,
                self.execute_once(&content, post_id, stage),
            )
            .await;

            match outcome {
                Ok(Ok(StageOutcome::Applied)) => {
                    info!(post_id, stage = stage.as_str(), %execution_id, attempt, "stage succeeded");
                    return;
                }
                Ok(Ok(StageOutcome::Superseded)) => {
                    warn!(
                        post_id,
                        stage = stage.as_str(),
                        %execution_id,
                        "post changed while stage ran; result dropped"
                    );
                    return;
                }
                Ok(Err(e)) => {
                    warn!(
                        post_id,
                        stage = stage.as_str(),
                        %execution_id,
                        attempt,
                        error = %e,
                        "stage attempt failed"
                    );
                }
                Err(_) => {
                    warn!(
                        post_id,
                        stage = stage.as_str(),
                        %execution_id,
                        attempt,
                        timeout_secs = self.config.stage_timeout.as_secs(),
                        "stage attempt timed out"
                    );
                }
            }
        }

        // Attempt budget exhausted: flag the post so it is never left in an
        // intermediate status. Applies to both stages.
        match Post::set_error(post_id, &self.pool).await {
            Ok(true) => {
                info!(post_id, stage = stage.as_str(), %execution_id, "post marked ERROR")
            }
            Ok(false) => debug!(
                post_id,
                stage = stage.as_str(),
                "post no longer in a stage status; ERROR not applied"
            ),
            Err(e) => error!(post_id, error = %e, "failed to mark post ERROR"),
        }
    }

    /// One collaborator call plus its store write.
    async fn execute_once(
        &self,
        content: &Arc<dyn BaseContentService>,
        post_id: i64,
        stage: Stage,
    ) -> Result<StageOutcome> {
        let Some(post) = Post::find_for_stage(post_id, &self.pool).await? else {
            // Deleted while queued; nothing to write.
            return Ok(StageOutcome::Superseded);
        };

        match stage {
            Stage::Research => {
                let outline = content.research_outline(&post.topic, &post.keywords).await?;
                let applied = Post::set_outline_ready(post_id, &outline, &self.pool).await?;
                Ok(if applied {
                    StageOutcome::Applied
                } else {
                    StageOutcome::Superseded
                })
            }
            Stage::Writing => {
                let outline = post
                    .outline
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("Outline data missing"))?;
                let text = content.generate_content(&post.topic, &outline.0).await?;
                let applied = Post::set_published(post_id, &text, &self.pool).await?;
                Ok(if applied {
                    StageOutcome::Applied
                } else {
                    StageOutcome::Superseded
                })
            }
        }
    }
}

/// A held execution slot for one post, handed out by [`StageExecutor::reserve`].
///
/// Either consumed by [`start`](Self::start), which frees the slot when the
/// spawned execution finishes, or dropped, which frees it immediately.
pub struct StageReservation {
    executor: Arc<StageExecutor>,
    post_id: i64,
    started: bool,
}

impl StageReservation {
    /// Spawn the stage execution this slot was reserved for.
    pub fn start(mut self, stage: Stage) {
        let Some(content) = self.executor.content.clone() else {
            // reserve() refuses when no content service is configured.
            return;
        };
        self.started = true;

        let executor = Arc::clone(&self.executor);
        let post_id = self.post_id;
        let execution_id = Uuid::new_v4();
        info!(post_id, stage = stage.as_str(), %execution_id, "dispatching stage");

        tokio::spawn(async move {
            executor.run(content, post_id, stage, execution_id).await;
            executor.release(post_id);
        });
    }
}

impl Drop for StageReservation {
    fn drop(&mut self) {
        if !self.started {
            self.executor.release(self.post_id);
        }
    }
}

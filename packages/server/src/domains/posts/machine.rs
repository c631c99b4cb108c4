//! Pipeline state machine for blog posts.
//!
//! The status field is both the pipeline marker and the user-facing display
//! value. Transitions are applied only through the edges encoded here: the
//! stage executor writes stage completions, user-facing mutations write
//! UPDATED/SCHEDULED, and everything else is rejected.
//!
//! ```text
//! RESEARCHING ──► OUTLINE_READY ──► WRITING ──► PUBLISHED
//!      │                               │
//!      └──────────► ERROR ◄────────────┘
//!                     │
//!                     └─► re-trigger re-enters RESEARCHING / WRITING
//! ```
//!
//! Any reachable state may additionally move to UPDATED (manual edit) or
//! SCHEDULED (publish scheduling, orthogonal to pipeline progress).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Researching,
    OutlineReady,
    Writing,
    Published,
    Updated,
    Scheduled,
    Error,
}

impl PostStatus {
    /// Whether the state machine permits moving from `self` to `to`.
    pub fn can_transition(self, to: PostStatus) -> bool {
        use PostStatus::*;
        match (self, to) {
            // Manual edit and scheduling are reachable from every state.
            (_, Updated) | (_, Scheduled) => true,
            (Researching, OutlineReady) | (Researching, Error) => true,
            (OutlineReady, Writing) => true,
            (Writing, Published) | (Writing, Error) => true,
            // ERROR is terminal unless the user re-triggers the failed stage.
            (Error, Researching) | (Error, Writing) => true,
            _ => false,
        }
    }

    /// States from which a user may trigger the writing stage.
    pub fn can_trigger_writing(self) -> bool {
        matches!(self, PostStatus::OutlineReady | PostStatus::Error)
    }

    /// Terminal pipeline states (no stage is expected to run next).
    pub fn is_terminal(self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Researching => "RESEARCHING",
            PostStatus::OutlineReady => "OUTLINE_READY",
            PostStatus::Writing => "WRITING",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Updated => "UPDATED",
            PostStatus::Scheduled => "SCHEDULED",
            PostStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

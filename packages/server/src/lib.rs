// AI Blog Pipeline - API Core
//
// This crate provides the backend for turning a user-submitted topic into
// published long-form content: research/outline generation, full-content
// generation, originality scoring, and scheduled publication.
//
// The pipeline state machine lives in domains/posts; background stage
// execution lives in kernel/stages.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;

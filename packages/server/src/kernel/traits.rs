// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The stage executor and routes depend on these seams so tests can swap in
// scripted doubles.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a prompt with an LLM (returns raw text response)
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt expecting JSON response (returns raw JSON string)
    /// Parse with serde_json::from_str in calling code
    async fn complete_json(&self, prompt: &str) -> Result<String> {
        // Default implementation calls complete
        self.complete(prompt).await
    }
}

// =============================================================================
// Web Search Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

#[async_trait]
pub trait BaseSearchService: Send + Sync {
    /// Run a web search and return up to `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

// =============================================================================
// Content Service Trait (the pipeline's external collaborator)
// =============================================================================

/// Originality verdict for a piece of content. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalityReport {
    /// Similarity score, clamped to 0..=100.
    pub score: u8,
    pub risk_level: String,
    pub summary: String,
}

/// The four slow, fallible, single-shot operations the pipeline delegates to.
///
/// Research and writing are invoked only by the stage executor, off the
/// request path. Analyze and rewrite are synchronous delegations whose
/// results are returned to the caller and never persisted.
#[async_trait]
pub trait BaseContentService: Send + Sync {
    /// Research a topic and produce a structured outline.
    async fn research_outline(&self, topic: &str, keywords: &str) -> Result<serde_json::Value>;

    /// Write the full post from a topic and an approved outline.
    async fn generate_content(&self, topic: &str, outline: &serde_json::Value) -> Result<String>;

    /// Score content for AI-pattern similarity.
    async fn analyze_originality(&self, content: &str) -> Result<OriginalityReport>;

    /// Rewrite content toward a requested tone, weaving in user context.
    async fn rewrite_content(
        &self,
        content: &str,
        user_context: &str,
        tone: &str,
    ) -> Result<String>;
}

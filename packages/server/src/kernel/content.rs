//! LLM-backed implementation of the external content service.
//!
//! Composes the generic AI and web-search seams into the four pipeline
//! operations. Models routinely wrap JSON in markdown fences or pad it with
//! prose, so every JSON-returning operation scrubs the raw response before
//! parsing; a response that still fails to parse is a collaborator error and
//! surfaces to the stage executor as such.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{BaseAI, BaseContentService, BaseSearchService, OriginalityReport};

/// Search hits fetched per research call. Kept low to save quota.
const RESEARCH_MAX_RESULTS: usize = 2;

pub struct LlmContentService {
    ai: Arc<dyn BaseAI>,
    search: Arc<dyn BaseSearchService>,
}

impl LlmContentService {
    pub fn new(ai: Arc<dyn BaseAI>, search: Arc<dyn BaseSearchService>) -> Self {
        Self { ai, search }
    }
}

#[async_trait]
impl BaseContentService for LlmContentService {
    async fn research_outline(&self, topic: &str, keywords: &str) -> Result<serde_json::Value> {
        let hits = self
            .search
            .search(&format!("{} {}", topic, keywords), RESEARCH_MAX_RESULTS)
            .await
            .context("Web search failed")?;
        tracing::debug!(hit_count = hits.len(), topic, "research search complete");

        let research: String = hits
            .iter()
            .map(|h| format!("- {} ({}): {}", h.title, h.url, h.content))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Topic: {topic}. Research: {research}. Create a blog outline in JSON format only. \
             Structure: {{ \"sections\": [ {{ \"heading\": \"Title\", \"points\": [\"...\"] }} ] }}"
        );

        let raw = self.ai.complete_json(&prompt).await?;
        let cleaned = strip_code_fences(&raw);

        serde_json::from_str(cleaned).context("Outline response was not valid JSON")
    }

    async fn generate_content(&self, topic: &str, outline: &serde_json::Value) -> Result<String> {
        let prompt = format!(
            "You are a professional blog writer. Topic: {topic}. Outline: {outline}. \
             Task: Write a full, engaging blog post following this outline exactly. \
             Use clear Markdown headings, write at least 2-3 paragraphs per section, \
             and include an introduction and a compelling conclusion."
        );

        let content = self.ai.complete(&prompt).await?;
        if content.trim().is_empty() {
            anyhow::bail!("Writer returned empty content");
        }
        Ok(content)
    }

    async fn analyze_originality(&self, content: &str) -> Result<OriginalityReport> {
        let prompt = format!(
            "Evaluate the following manuscript for AI-pattern similarity and originality.\n\
             \n\
             SCORING RULES (STRICT):\n\
             - Return an INTEGER from 0 to 100\n\
             - Do NOT include % symbol\n\
             - Do NOT include text outside JSON\n\
             \n\
             Return ONLY valid JSON in this exact format:\n\
             {{\n\
               \"overall_similarity_score\": 0,\n\
               \"risk_level\": \"low | medium | high\",\n\
               \"analysis_summary\": \"short explanation\"\n\
             }}\n\
             \n\
             Content:\n{content}"
        );

        let raw = self.ai.complete_json(&prompt).await?;
        parse_originality(&raw)
    }

    async fn rewrite_content(&self, content: &str, user_context: &str, tone: &str) -> Result<String> {
        let prompt = format!(
            "You are a content humanizer. Rewrite the blog post below so it reads as if a \
             person wrote it: vary sentence length, drop formulaic transitions, use \
             contractions, and keep the facts intact.\n\
             Incorporate this context from the author: {user_context}\n\
             TARGET TONE: {tone}\n\
             \n\
             ORIGINAL CONTENT:\n{content}\n\
             \n\
             OUTPUT JSON ONLY:\n{{ \"rewritten_content\": \"<rewritten version here>\" }}"
        );

        let raw = self.ai.complete_json(&prompt).await?;
        let cleaned = strip_code_fences(&raw);

        #[derive(Deserialize)]
        struct Rewrite {
            rewritten_content: String,
        }

        let parsed: Rewrite = serde_json::from_str(extract_json_object(cleaned).unwrap_or(cleaned))
            .context("Rewrite response was not valid JSON")?;
        if parsed.rewritten_content.trim().is_empty() {
            anyhow::bail!("Rewriter returned empty content");
        }
        Ok(parsed.rewritten_content)
    }
}

/// Strips a leading ```json / ``` fence pair if the model added one.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Returns the outermost `{ ... }` slice of a response, if any.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn parse_originality(raw: &str) -> Result<OriginalityReport> {
    let cleaned = strip_code_fences(raw);
    let object = extract_json_object(cleaned)
        .ok_or_else(|| anyhow::anyhow!("No JSON found in originality response"))?;

    #[derive(Deserialize)]
    struct Verdict {
        overall_similarity_score: i64,
        #[serde(default)]
        risk_level: Option<String>,
        #[serde(default)]
        analysis_summary: Option<String>,
    }

    let verdict: Verdict =
        serde_json::from_str(object).context("Originality response was not valid JSON")?;

    Ok(OriginalityReport {
        score: verdict.overall_similarity_score.clamp(0, 100) as u8,
        risk_level: verdict.risk_level.unwrap_or_else(|| "low".to_string()),
        summary: verdict.analysis_summary.unwrap_or_default(),
    })
}

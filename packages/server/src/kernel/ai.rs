// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in the content service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::openai;

use super::BaseAI;

/// OpenAI implementation of AI capabilities
#[derive(Clone)]
pub struct OpenAIClient {
    client: openai::Client,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        let client = openai::Client::new(&api_key);
        Self {
            client,
            model: openai::GPT_4O.to_string(),
        }
    }

    pub fn with_model(api_key: String, model: &str) -> Self {
        let client = openai::Client::new(&api_key);
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl BaseAI for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!(
            prompt_length = prompt.len(),
            model = %self.model,
            "Building OpenAI agent for completion"
        );

        let agent = self
            .client
            .agent(&self.model)
            .preamble("You are a helpful assistant.")
            .max_tokens(4096)
            .build();

        let response = agent
            .prompt(prompt)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    model = %self.model,
                    prompt_preview = %&prompt[..prompt.len().min(200)],
                    "OpenAI API call failed"
                );
                e
            })
            .context("Failed to call OpenAI API")?;

        tracing::debug!(
            response_length = response.len(),
            model = %self.model,
            "OpenAI API response received"
        );

        Ok(response)
    }
}

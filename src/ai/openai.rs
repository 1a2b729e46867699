//! OpenAI API integration.
//!
//! Also works with any OpenAI-compatible endpoint via `base_url`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{api_key, check_status, http_client, log_call, CompletionProvider};
use crate::core::{LlmConfig, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIProvider {
    /// Create a provider from configuration.
    ///
    /// Reads the API key from config or `OPENAI_API_KEY`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(config)?,
            api_key: api_key(config)?,
            model: config.model_name.clone(),
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_request(&self, prompt: &str, system_prompt: &str) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage { role: "system".to_string(), content: system_prompt.to_string() });
        }
        messages.push(ChatMessage { role: "user".to_string(), content: prompt.to_string() });

        OpenAIRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, ProviderError> {
        let request = self.build_request(prompt, system_prompt);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response: OpenAIResponse = check_status(response).await?.json().await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::NoResponse(self.name().to_string()))?;

        log_call(self.name(), &self.model, prompt, &text);
        Ok(text)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI API request structure.
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat message.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI API response structure.
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

/// Choice in an OpenAI response.
#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

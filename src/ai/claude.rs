//! Anthropic messages API integration.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{api_key, check_status, http_client, log_call, CompletionProvider};
use crate::core::{LlmConfig, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API provider.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a provider from configuration.
    ///
    /// Reads the API key from config or `ANTHROPIC_API_KEY`.
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

    /// The system prompt travels in front of the user message.
    fn user_message(prompt: &str, system_prompt: &str) -> String {
        if system_prompt.is_empty() {
            prompt.to_string()
        } else {
            format!("{system_prompt}\n\n{prompt}")
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, ProviderError> {
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user".to_string(),
                content: Self::user_message(prompt, system_prompt),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let response: ClaudeResponse = check_status(response).await?.json().await?;

        let text = response
            .content
            .into_iter()
            .find_map(|c| c.text)
            .ok_or_else(|| ProviderError::NoResponse(self.name().to_string()))?;

        log_call(self.name(), &self.model, prompt, &text);
        Ok(text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Anthropic API request structure.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

/// Message in an Anthropic request.
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

/// Anthropic API response structure.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
}

/// Content block in an Anthropic response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_prepended() {
        let message = AnthropicProvider::user_message("Write a BRD", "You are an analyst.");
        assert_eq!(message, "You are an analyst.\n\nWrite a BRD");
        assert_eq!(AnthropicProvider::user_message("Write", ""), "Write");
    }

    #[test]
    fn test_response_parsing_skips_non_text_blocks() {
        let json = r#"{"content":[{"type":"tool_use"},{"type":"text","text":"hello"}]}"#;
        let response: ClaudeResponse = serde_json::from_str(json).unwrap();
        let text = response.content.into_iter().find_map(|c| c.text);
        assert_eq!(text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_model_from_config() {
        let config = LlmConfig {
            api_key: Some("k".to_string()),
            model_name: "claude-x".to_string(),
            ..LlmConfig::default()
        };
        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.model(), "claude-x");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }
}

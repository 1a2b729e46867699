//! Ollama local LLM integration.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, http_client, log_call, CompletionProvider};
use crate::core::{LlmConfig, ProviderError};

/// Ollama API provider for local LLM.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaProvider {
    /// Create a provider from configuration.
    ///
    /// The base URL comes from config, then `OLLAMA_HOST`, then localhost:11434.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let base_url = config
            .base_url
            .clone()
            .or_else(|| std::env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: http_client(config)?,
            base_url,
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Create with a specific base URL.
    fn build_request(&self, prompt: &str, system_prompt: &str) -> OllamaRequest {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage { role: "system".to_string(), content: system_prompt.to_string() });
        }
        messages.push(ChatMessage { role: "user".to_string(), content: prompt.to_string() });

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: OllamaOptions { temperature: self.temperature, num_predict: self.max_tokens },
        }
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, ProviderError> {
        let request = self.build_request(prompt, system_prompt);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let response: OllamaResponse = check_status(response).await?.json().await?;
        let text = response.message.content;

        log_call(self.name(), &self.model, prompt, &text);
        Ok(text)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama chat request structure.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

/// Sampling options.
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Chat message.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat response structure.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: ChatMessage,
}

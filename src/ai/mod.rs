//! Completion provider integration.
//!
//! One provider type per backend, all behind [`CompletionProvider`].
//! The backend is chosen once, from [`ProviderKind`], by [`build_provider`].

mod claude;
mod gemini;
mod ollama;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

pub use claude::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use crate::core::{LlmConfig, ProviderError, ProviderKind};

/// A text completion backend.
///
/// Implementations are stateless between calls. They never retry; callers
/// decide what a failure means.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete `prompt` under the given system prompt.
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, ProviderError>;

    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the model name.
    fn model(&self) -> &str;
}

/// Build the provider selected by the configuration.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    let provider: Arc<dyn CompletionProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::from_config(config)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_config(config)?),
    };

    tracing::info!(provider = provider.name(), model = provider.model(), "Completion provider ready");
    Ok(provider)
}

/// Build an HTTP client, applying the configured timeout.
fn http_client(config: &LlmConfig) -> Result<Client, ProviderError> {
    let mut builder = Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Resolve the API key from config or the provider's environment variable.
fn api_key(config: &LlmConfig) -> Result<String, ProviderError> {
    if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
        return Ok(key.clone());
    }

    let var = config
        .provider
        .api_key_env()
        .ok_or_else(|| ProviderError::NotConfigured(config.provider.to_string()))?;

    std::env::var(var)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ProviderError::NotConfigured(format!("{var} not set")))
}

/// Turn a non-success response into a [`ProviderError::Api`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api { status, body })
}

/// Log one completion call.
fn log_call(provider: &str, model: &str, prompt: &str, response: &str) {
    tracing::info!(
        provider,
        model,
        prompt_len = prompt.len(),
        response_len = response.len(),
        "LLM call"
    );
}

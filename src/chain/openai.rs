use crate::chain::Chain;
use crate::config::GenerationConfig;
use crate::embeddings::openai::is_retryable;
use crate::error::{RagQueryError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions chain for OpenAI-compatible servers (OpenAI, Ollama, vLLM, ...)
pub struct OpenAIChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: usize,
    initial_backoff: Duration,
}

impl OpenAIChat {
    /// Create a chat client from the `[generation]` settings
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token sent with every request
    /// * `config` - Model, endpoint, sampling and retry settings
    ///
    /// # Returns
    ///
    /// The client, or a `Config` error if the HTTP client cannot be built
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagQueryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            initial_backoff: Duration::from_secs(1),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Chain for OpenAIChat {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let request = self.request(prompt);
        let mut attempt = 0;
        let mut delay = self.initial_backoff;

        let response = loop {
            let response = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| RagQueryError::Generation(format!("Network error: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                break response;
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if attempt < self.max_retries && is_retryable(status) {
                log::warn!(
                    "Chat completion retry {}/{} after {}: {}",
                    attempt + 1,
                    self.max_retries,
                    status,
                    body
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
                continue;
            }

            return Err(RagQueryError::Generation(format!("LLM API error {}: {}", status, body)));
        };

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagQueryError::Generation(format!("Failed to parse response: {}", e)))?;

        let text = extract_content(result)?;
        log::debug!(
            "Chat completion with {} took {:?} ({} chars)",
            self.model,
            start.elapsed(),
            text.len()
        );
        Ok(text)
    }
}

fn extract_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| RagQueryError::Generation("LLM response contained no choices".to_string()))
}

use crate::cache::EmbeddingCache;
use crate::embeddings::Embedder;
use crate::error::{RagQueryError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const MAX_RETRIES: usize = 3;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings client
///
/// Embeds one query per call, retrying rate limits and server errors with
/// exponential backoff. Query embeddings are optionally cached.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    cache: Option<Arc<EmbeddingCache>>,
    initial_backoff: Duration,
}

impl OpenAIEmbedder {
    /// Create a new embedder
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token sent with every request
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `cache` - Optional LRU cache for query embeddings
    ///
    /// # Returns
    ///
    /// The embedder, or a `Config` error if the HTTP client cannot be built
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        cache: Option<Arc<EmbeddingCache>>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagQueryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            initial_backoff: Duration::from_millis(500),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    /// Single API request; errors carry the HTTP status when one was received
    async fn request_embedding(&self, text: &str) -> std::result::Result<Vec<f32>, (Option<StatusCode>, String)> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| (None, format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err((Some(status), format!("API error {}: {}", status, body)));
        }

        let mut result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| (None, format!("Failed to parse response: {}", e)))?;

        if result.data.is_empty() {
            return Err((None, "Empty response from embeddings API".to_string()));
        }
        Ok(result.data.swap_remove(0).embedding)
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = self.initial_backoff;

        loop {
            match self.request_embedding(text).await {
                Ok(embedding) => {
                    log::debug!("Embedding API call took {:?} (attempt {})", start.elapsed(), attempt + 1);
                    return Ok(embedding);
                }
                Err((Some(status), msg)) if attempt < MAX_RETRIES && is_retryable(status) => {
                    log::warn!("Embedding retry {}/{} after error: {}", attempt + 1, MAX_RETRIES, msg);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err((_, msg)) => return Err(RagQueryError::Embedding(msg)),
            }
        }
    }
}

/// Rate limits and server-side failures are worth retrying
pub(crate) fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    /// Surrounding whitespace is stripped before both the cache lookup and the API call.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                let stats = cache.stats();
                log::debug!(
                    "Embedding cache hit for query: {} ({} hits / {} misses)",
                    text,
                    stats.hits,
                    stats.misses
                );
                return Ok(cached);
            }
        }

        let embedding = self.embed_with_retry(text).await?;

        if let Some(cache) = &self.cache {
            cache.put(text, embedding.clone());
            let stats = cache.stats();
            log::debug!(
                "Embedding cache holds {} queries ({} hits / {} misses)",
                cache.len(),
                stats.hits,
                stats.misses
            );
        }

        Ok(embedding)
    }
}

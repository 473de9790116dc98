//! HTTP client for the embedding service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{DeviceInfo, EmbeddingService};
use crate::error::EmbeddingError;

/// Client for a remote embedding service.
///
/// `GET {base}/health` returns [`DeviceInfo`];
/// `POST {base}/embed {"texts": [..]}` returns `{"embeddings": [[..]]}`.
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbeddingClient {
    /// Create a new embedding client.
    pub fn new(base_url: &str) -> Result<Self, EmbeddingError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn initialize(&self) -> Result<DeviceInfo, EmbeddingError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Unavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }

        let info: DeviceInfo = response.json().await?;
        info!(device = %info.device, model = ?info.model, "Embedding service ready");
        Ok(info)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_many(&[text])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embeddings".to_string()))
    }

    /// Embed several texts in one request.
    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/embed", self.base_url);
        debug!(count = texts.len(), "Requesting embeddings");

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { texts })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(%status, "Embedding service returned an error");
            return Err(EmbeddingError::Request(format!(
                "embedding service returned {}: {}",
                status, text
            )));
        }

        let result: EmbedResponse = response.json().await?;
        if result.embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.embeddings.len()
            )));
        }
        Ok(result.embeddings)
    }
}

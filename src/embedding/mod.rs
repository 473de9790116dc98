//! Embedding service interface, HTTP client and batch pipeline.

mod client;
mod pipeline;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

pub use client::HttpEmbeddingClient;
pub use pipeline::{attach_embeddings, EmbeddingPipeline, Progress};

#[cfg(test)]
pub(crate) use pipeline::tests::MockEmbedder;

/// What the embedding service reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Compute device, e.g. "cpu" or "cuda:0"
    #[serde(default)]
    pub device: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Vector dimensionality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

/// An opaque text to vector service.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Prepare the service and report the device it runs on.
    async fn initialize(&self) -> Result<DeviceInfo, EmbeddingError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, in input order. Services with a batch endpoint
    /// should override this; the default embeds each text concurrently.
    async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        join_all(texts.iter().map(|text| self.embed(text)))
            .await
            .into_iter()
            .collect()
    }
}

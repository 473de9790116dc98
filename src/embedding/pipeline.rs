//! Batched, retried and cancellable embedding of many texts.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::EmbeddingService;
use crate::cancel::CancellationToken;
use crate::error::EmbeddingError;
use crate::types::{Chunk, EmbeddingConfig};

/// Embedding progress after a completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub percentage: f32,
}

impl Progress {
    pub fn new(processed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            processed as f32 * 100.0 / total as f32
        };
        Self {
            processed,
            total,
            percentage,
        }
    }
}

/// Embeds texts in batches through an [`EmbeddingService`].
///
/// Each batch goes to the service in one [`EmbeddingService::embed_many`]
/// call. A failed batch is retried with a fixed delay; a batch that still
/// fails ends the whole run with [`EmbeddingError::RetriesExhausted`], naming
/// the first item of that batch.
pub struct EmbeddingPipeline {
    service: Arc<dyn EmbeddingService>,
    config: EmbeddingConfig,
}

impl EmbeddingPipeline {
    pub fn new(service: Arc<dyn EmbeddingService>, config: EmbeddingConfig) -> Self {
        Self { service, config }
    }

    pub fn service(&self) -> &Arc<dyn EmbeddingService> {
        &self.service
    }

    /// Embed `texts`, calling `on_progress` after each batch.
    ///
    /// The result is in input order. `cancel` is checked before every batch
    /// and every attempt.
    pub async fn embed_batch<F>(
        &self,
        texts: &[String],
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>
    where
        F: FnMut(Progress) + Send,
    {
        let total = texts.len();
        let batch_size = self.config.batch_size.max(1);
        let mut embeddings = Vec::with_capacity(total);

        info!(total, batch_size, "Embedding texts");

        for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                debug!(processed = embeddings.len(), total, "Embedding cancelled");
                return Err(EmbeddingError::Cancelled);
            }

            let base = batch_index * batch_size;
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = self.embed_with_retry(base, &refs, cancel).await?;
            embeddings.extend(vectors);

            on_progress(Progress::new(embeddings.len(), total));
        }

        Ok(embeddings)
    }

    async fn embed_with_retry(
        &self,
        first_index: usize,
        texts: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let attempts = self.config.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Err(EmbeddingError::Cancelled);
            }
            match self.service.embed_many(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
                Ok(vectors) => {
                    warn!(first_index, attempt, expected = texts.len(), got = vectors.len(), "Embedding count mismatch");
                    last_error = format!("expected {} embeddings, got {}", texts.len(), vectors.len());
                }
                Err(EmbeddingError::Cancelled) => return Err(EmbeddingError::Cancelled),
                Err(e) => {
                    warn!(first_index, attempt, error = %e, "Embedding attempt failed");
                    last_error = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        Err(EmbeddingError::RetriesExhausted {
            index: first_index,
            attempts,
            message: last_error,
        })
    }
}

/// Attach embeddings to chunks in order.
pub fn attach_embeddings(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| chunk.with_embedding(embedding))
        .collect()
}

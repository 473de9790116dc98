//! Parallel chunking of many documents.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ChunkError;
use crate::router::ChunkingRouter;
use crate::types::{Chunk, ChunkConfig, SourceDocument};

/// Configuration for batch processing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum documents chunked at once
    pub concurrency: usize,
    /// Whether to continue on individual document failures
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            continue_on_error: true,
        }
    }
}

/// Result of batch processing.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total_documents: usize,
    pub processed_documents: usize,
    pub failed_documents: usize,
    pub total_chunks: usize,
    pub errors: Vec<BatchError>,
}

/// Error during batch processing.
#[derive(Debug, Clone)]
pub struct BatchError {
    pub document_id: Uuid,
    pub error: String,
}

/// Chunks of one document.
#[derive(Debug, Clone)]
pub struct DocumentChunks {
    pub document_id: Uuid,
    pub chunks: Vec<Chunk>,
}

/// Chunks documents on the blocking pool with bounded concurrency.
pub struct BatchProcessor {
    router: Arc<ChunkingRouter>,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(router: Arc<ChunkingRouter>, config: BatchConfig) -> Self {
        Self { router, config }
    }

    /// Chunk every document. Output is in input order.
    ///
    /// With `continue_on_error` off, the first failure is returned.
    pub async fn process_batch(
        &self,
        documents: Vec<SourceDocument>,
        chunk_config: &ChunkConfig,
    ) -> Result<(Vec<DocumentChunks>, BatchResult), ChunkError> {
        let total_documents = documents.len();
        info!(total_documents, concurrency = self.config.concurrency, "Starting batch processing");

        let handles = self.spawn_all(documents, chunk_config);
        let mut output = Vec::with_capacity(total_documents);
        let mut result = BatchResult {
            total_documents,
            ..Default::default()
        };

        for (document_id, handle) in handles {
            match join(handle).await {
                Ok(chunks) => {
                    result.processed_documents += 1;
                    result.total_chunks += chunks.len();
                    output.push(DocumentChunks {
                        document_id,
                        chunks,
                    });
                }
                Err(e) => {
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                    warn!(%document_id, error = %e, "Failed to chunk document");
                    result.failed_documents += 1;
                    result.errors.push(BatchError {
                        document_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = result.processed_documents,
            failed = result.failed_documents,
            chunks = result.total_chunks,
            "Batch processing complete"
        );
        Ok((output, result))
    }

    /// Like [`Self::process_batch`], but sends each document's chunks as soon
    /// as they are ready, in input order. Stops early if the receiver goes
    /// away.
    pub async fn process_batch_streaming(
        &self,
        documents: Vec<SourceDocument>,
        chunk_config: &ChunkConfig,
        sender: mpsc::Sender<DocumentChunks>,
    ) -> Result<BatchResult, ChunkError> {
        let mut result = BatchResult {
            total_documents: documents.len(),
            ..Default::default()
        };

        for (document_id, handle) in self.spawn_all(documents, chunk_config) {
            match join(handle).await {
                Ok(chunks) => {
                    result.processed_documents += 1;
                    result.total_chunks += chunks.len();
                    let message = DocumentChunks {
                        document_id,
                        chunks,
                    };
                    if sender.send(message).await.is_err() {
                        warn!("Receiver dropped, stopping batch processing");
                        break;
                    }
                }
                Err(e) => {
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                    result.failed_documents += 1;
                    result.errors.push(BatchError {
                        document_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    fn spawn_all(
        &self,
        documents: Vec<SourceDocument>,
        chunk_config: &ChunkConfig,
    ) -> Vec<(Uuid, tokio::task::JoinHandle<Result<Vec<Chunk>, ChunkError>>)> {
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        documents
            .into_iter()
            .map(|document| {
                let id = document.id;
                let router = Arc::clone(&self.router);
                let config = chunk_config.clone();
                let permits = Arc::clone(&permits);
                let handle = tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| ChunkError::Task(e.to_string()))?;
                    tokio::task::spawn_blocking(move || {
                        router.get_chunker(&document).chunk(&document, &config)
                    })
                    .await
                    .map_err(|e| ChunkError::Task(e.to_string()))?
                });
                (id, handle)
            })
            .collect()
    }
}

async fn join(
    handle: tokio::task::JoinHandle<Result<Vec<Chunk>, ChunkError>>,
) -> Result<Vec<Chunk>, ChunkError> {
    handle
        .await
        .map_err(|e| ChunkError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkingStrategy;

    fn documents(n: usize) -> Vec<SourceDocument> {
        (0..n)
            .map(|i| {
                SourceDocument::new(
                    &format!("doc{}.txt", i),
                    &format!(
                        "Document {} begins here with a full sentence. It continues with another one.\n\n\
                         A second paragraph closes the document {} with a final sentence.",
                        i, i
                    ),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let processor = BatchProcessor::new(Arc::new(ChunkingRouter::default()), BatchConfig::default());
        let docs = documents(6);
        let ids: Vec<Uuid> = docs.iter().map(|d| d.id).collect();

        let (output, result) = processor
            .process_batch(docs, &ChunkConfig::default())
            .await
            .unwrap();

        assert_eq!(result.processed_documents, 6);
        assert_eq!(result.failed_documents, 0);
        assert_eq!(output.iter().map(|d| d.document_id).collect::<Vec<_>>(), ids);
        assert!(output.iter().all(|d| !d.chunks.is_empty()));
    }

    #[tokio::test]
    async fn test_panicked_task_is_a_task_error() {
        let handle: tokio::task::JoinHandle<Result<Vec<Chunk>, ChunkError>> = tokio::spawn(async {
            if true {
                panic!("chunker panicked");
            }
            Ok(Vec::new())
        });
        assert!(matches!(join(handle).await, Err(ChunkError::Task(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_is_reported() {
        let processor = BatchProcessor::new(Arc::new(ChunkingRouter::default()), BatchConfig::default());
        let mut config = ChunkConfig::default();
        config.chars_per_token = 0;
        let docs: Vec<SourceDocument> = documents(2)
            .into_iter()
            .map(|d| d.with_strategy(ChunkingStrategy::Token))
            .collect();

        let (_, result) = processor.process_batch(docs.clone(), &config).await.unwrap();
        assert_eq!(result.failed_documents, 2);

        let strict = BatchProcessor::new(
            Arc::new(ChunkingRouter::default()),
            BatchConfig {
                continue_on_error: false,
                ..Default::default()
            },
        );
        assert!(strict.process_batch(docs, &config).await.is_err());
    }

    #[tokio::test]
    async fn test_streaming() {
        let processor = BatchProcessor::new(
            Arc::new(ChunkingRouter::default()),
            BatchConfig {
                concurrency: 2,
                ..Default::default()
            },
        );
        let (tx, mut rx) = mpsc::channel(8);
        let result = processor
            .process_batch_streaming(documents(3), &ChunkConfig::default(), tx)
            .await
            .unwrap();
        assert_eq!(result.processed_documents, 3);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 3);
    }
}

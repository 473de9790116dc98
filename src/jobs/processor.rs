//! Upload pipeline and job processor.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::store::JobStore;
use crate::cancel::CancellationToken;
use crate::embedding::{attach_embeddings, EmbeddingPipeline, Progress};
use crate::error::{ChunkError, EmbeddingError, PipelineError};
use crate::router::ChunkingRouter;
use crate::store::ChunkStore;
use crate::types::{Chunk, ChunkFile, ChunkingStrategy, PipelineStage, SourceDocument, StartIngestRequest};

/// Content types the extraction stage accepts.
const SUPPORTED_CONTENT_TYPES: &[&str] = &["text/", "application/pdf", "application/json"];

/// Progress of one upload, tagged with the running stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageProgress {
    pub stage: PipelineStage,
    #[serde(flatten)]
    pub progress: Progress,
}

/// Chunk, embed and save one document.
///
/// Each failure names its stage. A failure after chunking carries the chunks
/// produced so far.
pub struct UploadPipeline {
    router: Arc<ChunkingRouter>,
    embedder: Option<Arc<EmbeddingPipeline>>,
    store: Arc<ChunkStore>,
}

impl UploadPipeline {
    pub fn new(
        router: Arc<ChunkingRouter>,
        embedder: Option<Arc<EmbeddingPipeline>>,
        store: Arc<ChunkStore>,
    ) -> Self {
        Self {
            router,
            embedder,
            store,
        }
    }

    pub fn router(&self) -> &Arc<ChunkingRouter> {
        &self.router
    }

    pub fn embedder(&self) -> Option<&Arc<EmbeddingPipeline>> {
        self.embedder.as_ref()
    }

    /// Run every stage for `document`.
    pub async fn run<F>(
        &self,
        document: &SourceDocument,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<ChunkFile, PipelineError>
    where
        F: FnMut(StageProgress) + Send,
    {
        extract(document)?;

        let (strategy, chunks) = self.chunk(document, cancel).await?;
        on_progress(StageProgress {
            stage: PipelineStage::Chunking,
            progress: Progress::new(1, 1),
        });

        let chunks = match &self.embedder {
            Some(embedder) => {
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let embedded = embedder
                    .embed_batch(
                        &texts,
                        |progress| {
                            on_progress(StageProgress {
                                stage: PipelineStage::Embedding,
                                progress,
                            })
                        },
                        cancel,
                    )
                    .await;
                match embedded {
                    Ok(vectors) => attach_embeddings(chunks, vectors),
                    Err(EmbeddingError::Cancelled) => return Err(PipelineError::Cancelled),
                    Err(e) => {
                        return Err(PipelineError::Stage {
                            stage: PipelineStage::Embedding,
                            message: e.to_string(),
                            partial_chunks: chunks,
                        })
                    }
                }
            }
            None => chunks,
        };

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let file = ChunkFile::new(document.id, &document.filename, strategy, chunks);
        if let Err(e) = self.store.save(file.clone()).await {
            return Err(PipelineError::Stage {
                stage: PipelineStage::Save,
                message: e.to_string(),
                partial_chunks: file.chunks,
            });
        }
        on_progress(StageProgress {
            stage: PipelineStage::Save,
            progress: Progress::new(1, 1),
        });

        info!(
            document_id = %document.id,
            strategy = %strategy,
            chunks = file.chunk_count,
            embedded = file.embedded_count(),
            "Document ingested"
        );
        Ok(file)
    }

    /// Only the chunking stage.
    pub async fn chunk(
        &self,
        document: &SourceDocument,
        cancel: &CancellationToken,
    ) -> Result<(ChunkingStrategy, Vec<Chunk>), PipelineError> {
        let strategy = self.router.strategy_for(document);
        let config = self.router.default_config();

        let result = match strategy {
            ChunkingStrategy::Sentence => {
                self.router
                    .sentence_chunker()
                    .chunk_async(document, config, cancel)
                    .await
            }
            ChunkingStrategy::Token => {
                self.router
                    .token_chunker()
                    .chunk_async(document, config, cancel)
                    .await
            }
        };

        match result {
            Ok(chunks) => Ok((strategy, chunks)),
            Err(ChunkError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => Err(PipelineError::stage(PipelineStage::Chunking, e.to_string())),
        }
    }
}

fn extract(document: &SourceDocument) -> Result<(), PipelineError> {
    let content_type = document.content_type.to_lowercase();
    if SUPPORTED_CONTENT_TYPES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
    {
        Ok(())
    } else {
        Err(PipelineError::stage(
            PipelineStage::Extraction,
            format!("unsupported content type: {}", document.content_type),
        ))
    }
}

/// Runs ingest jobs against a [`JobStore`].
pub struct JobProcessor {
    pipeline: Arc<UploadPipeline>,
}

impl JobProcessor {
    pub fn new(pipeline: Arc<UploadPipeline>) -> Self {
        Self { pipeline }
    }

    /// Process every document of the request.
    ///
    /// A failed document is recorded and the rest continue; cancellation
    /// stops the job.
    pub async fn process_job(
        &self,
        job_id: Uuid,
        request: StartIngestRequest,
        job_store: Arc<RwLock<JobStore>>,
    ) {
        info!(job_id = %job_id, documents = request.documents.len(), "Starting job processing");

        let cancel = {
            let mut store = job_store.write().await;
            if store.get_job(job_id).map_or(true, |j| j.status.is_terminal()) {
                return;
            }
            store.start_job(job_id);
            store.cancellation_token(job_id).unwrap_or_default()
        };

        let mut processed = 0;
        let mut total_chunks = 0;
        let mut failures = 0;
        let mut first_failure: Option<(Option<PipelineStage>, String)> = None;

        for document in &request.documents {
            match self.pipeline.run(document, |_| {}, &cancel).await {
                Ok(file) => total_chunks += file.chunk_count,
                Err(PipelineError::Cancelled) => {
                    info!(job_id = %job_id, processed, "Job cancelled");
                    job_store.write().await.mark_cancelled(job_id);
                    return;
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        job_id = %job_id,
                        document_id = %document.id,
                        stage = ?e.failed_stage(),
                        error = %e,
                        "Failed to ingest document, continuing with others"
                    );
                    first_failure.get_or_insert_with(|| (e.failed_stage(), e.to_string()));
                }
            }

            processed += 1;
            job_store
                .write()
                .await
                .update_job_progress(job_id, processed, total_chunks);
        }

        let mut store = job_store.write().await;
        match first_failure {
            Some((stage, message)) => {
                error!(job_id = %job_id, failures, "Job finished with failures");
                store.fail_job(job_id, stage, message);
            }
            None => {
                info!(job_id = %job_id, documents = processed, chunks = total_chunks, "Job processing complete");
                store.complete_job(job_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingService, MockEmbedder};
    use crate::types::{ChunkingConfig, EmbeddingConfig, JobStatus};
    use std::time::Duration;

    const OPINION: &str = "The trial court granted summary judgment for the defendant. \
The plaintiff appealed to this court on the negligence claim.\n\n\
We review the grant of summary judgment de novo. Summary judgment is proper \
only when no genuine issue of material fact remains for trial. The record \
here shows a genuine dispute about the condition of the stairway.\n\n\
The judgment of the trial court is reversed and the cause is remanded.";

    fn pipeline(embedder: Option<Arc<dyn EmbeddingService>>) -> (UploadPipeline, Arc<ChunkStore>) {
        let store = Arc::new(ChunkStore::in_memory());
        let embedder = embedder.map(|service| {
            let config = EmbeddingConfig::default().with_retries(0, Duration::ZERO);
            Arc::new(EmbeddingPipeline::new(service, config))
        });
        let router = Arc::new(ChunkingRouter::new(&ChunkingConfig::default()));
        (UploadPipeline::new(router, embedder, store.clone()), store)
    }

    struct DownEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingService for DownEmbedder {
        async fn initialize(&self) -> Result<crate::embedding::DeviceInfo, EmbeddingError> {
            Err(EmbeddingError::Unavailable("offline".into()))
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_run_chunks_embeds_and_saves() {
        let (pipeline, store) = pipeline(Some(Arc::new(MockEmbedder::new())));
        let document = SourceDocument::new("opinion.txt", OPINION);
        let mut stages = Vec::new();

        let file = pipeline
            .run(&document, |p| stages.push(p.stage), &CancellationToken::new())
            .await
            .unwrap();

        assert!(file.chunk_count > 0);
        assert_eq!(file.embedded_count(), file.chunk_count);
        assert_eq!(file.chunking_strategy, ChunkingStrategy::Sentence);
        assert_eq!(stages.first(), Some(&PipelineStage::Chunking));
        assert_eq!(stages.last(), Some(&PipelineStage::Save));
        assert!(stages.contains(&PipelineStage::Embedding));
        assert_eq!(store.get(document.id).await.unwrap(), file);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_partial_chunks() {
        let (pipeline, store) = pipeline(Some(Arc::new(DownEmbedder)));
        let document = SourceDocument::new("opinion.txt", OPINION);

        let err = pipeline
            .run(&document, |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PipelineError::Stage {
                stage,
                partial_chunks,
                ..
            } => {
                assert_eq!(stage, PipelineStage::Embedding);
                assert!(!partial_chunks.is_empty());
                assert!(partial_chunks.iter().all(|c| c.embedding.is_none()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unsupported_content_type_fails_extraction() {
        let (pipeline, _) = pipeline(None);
        let mut document = SourceDocument::new("scan.png", OPINION);
        document.content_type = "image/png".to_string();
        let err = pipeline
            .run(&document, |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.failed_stage(), Some(PipelineStage::Extraction));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (pipeline, _) = pipeline(Some(Arc::new(MockEmbedder::new())));
        let token = CancellationToken::new();
        token.cancel();
        let document = SourceDocument::new("opinion.txt", OPINION);
        let err = pipeline.run(&document, |_| {}, &token).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_stops_paginated_upload() {
        let (pipeline, store) = pipeline(Some(Arc::new(MockEmbedder::new())));
        let pipeline = Arc::new(pipeline);
        let page = "The relator asks for a writ of mandamus. The commission denied the claim. ".repeat(40);
        let document = SourceDocument::paginated("record.pdf", vec![page; 30]);
        let token = CancellationToken::new();

        let task = {
            let pipeline = Arc::clone(&pipeline);
            let token = token.clone();
            tokio::spawn(async move { pipeline.run(&document, |_| {}, &token).await })
        };
        tokio::task::yield_now().await;
        token.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_job_records_failures_and_continues() {
        let (pipeline, store) = pipeline(None);
        let processor = JobProcessor::new(Arc::new(pipeline));
        let jobs = Arc::new(RwLock::new(JobStore::new()));
        let job_id = jobs.write().await.create_job(2);

        let mut bad = SourceDocument::new("scan.png", OPINION);
        bad.content_type = "image/png".to_string();
        let request = StartIngestRequest {
            documents: vec![bad, SourceDocument::new("opinion.txt", OPINION)],
        };
        processor.process_job(job_id, request, jobs.clone()).await;

        let status = jobs.read().await.get_job_status(job_id).unwrap();
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.failed_stage, Some(PipelineStage::Extraction));
        assert_eq!(status.processed_documents, 2);
        assert!(status.chunks_created > 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_job_completes() {
        let (pipeline, _) = pipeline(None);
        let processor = JobProcessor::new(Arc::new(pipeline));
        let jobs = Arc::new(RwLock::new(JobStore::new()));
        let job_id = jobs.write().await.create_job(1);
        let request = StartIngestRequest {
            documents: vec![SourceDocument::new("opinion.txt", OPINION)],
        };
        processor.process_job(job_id, request, jobs.clone()).await;
        assert_eq!(
            jobs.read().await.get_job_status(job_id).unwrap().status,
            JobStatus::Completed
        );
    }
}

//! HTTP request handlers for the docket service.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::{EmbeddingPipeline, EmbeddingService};
use crate::error::{RetrievalError, StoreError};
use crate::jobs::{JobProcessor, JobStore, UploadPipeline};
use crate::retrieval::{QueryEngine, QueryOutcome};
use crate::router::ChunkingRouter;
use crate::store::{ChunkStore, DocumentSummary};
use crate::types::{
    ChunkFile, ChunkingConfig, ChunkingProfile, JobStatus, JobStatusResponse,
    StartIngestRequest, StartIngestResponse,
};

/// Error half of every fallible handler.
pub type ApiError = (StatusCode, String);

/// Application state shared across handlers.
pub struct AppState {
    pub router: Arc<ChunkingRouter>,
    pub job_store: Arc<RwLock<JobStore>>,
    pub chunk_store: Arc<ChunkStore>,
    pub pipeline: Arc<UploadPipeline>,
    pub query_engine: Option<QueryEngine>,
    pub config: ChunkingConfig,
}

impl AppState {
    /// Wire the shared components together. Without an embedding service,
    /// uploads are chunked and stored unembedded and search is unavailable.
    pub fn new(
        config: ChunkingConfig,
        chunk_store: Arc<ChunkStore>,
        embedder: Option<Arc<dyn EmbeddingService>>,
    ) -> Self {
        let router = Arc::new(ChunkingRouter::new(&config));
        let embedding_pipeline = embedder.as_ref().map(|service| {
            Arc::new(EmbeddingPipeline::new(
                Arc::clone(service),
                config.embedding_config(),
            ))
        });
        let pipeline = Arc::new(UploadPipeline::new(
            Arc::clone(&router),
            embedding_pipeline,
            Arc::clone(&chunk_store),
        ));
        let query_engine = embedder.map(|service| QueryEngine::new(service, config.retrieval_config()));

        Self {
            router,
            job_store: Arc::new(RwLock::new(JobStore::new())),
            chunk_store,
            pipeline,
            query_engine,
            config,
        }
    }
}

fn retrieval_status(error: &RetrievalError) -> StatusCode {
    match error {
        RetrievalError::NoEmbeddings | RetrievalError::TopKOutOfRange { .. } => StatusCode::BAD_REQUEST,
        RetrievalError::Embedding(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
    embedding: bool,
    jobs: HashMap<JobStatus, usize>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.chunk_store.len().await,
        embedding: state.query_engine.is_some(),
        jobs: state.job_store.read().await.get_job_counts(),
    })
}

/// Start an ingest job.
pub async fn start_ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartIngestRequest>,
) -> Json<StartIngestResponse> {
    let documents_count = request.documents.len();

    if documents_count == 0 {
        return Json(StartIngestResponse {
            job_id: Uuid::nil(),
            accepted: false,
            documents_count: 0,
            message: Some("No documents provided".to_string()),
        });
    }

    let job_id = {
        let mut jobs = state.job_store.write().await;
        let dropped = jobs.cleanup_old_jobs(state.config.job_retention());
        if dropped > 0 {
            debug!(dropped, "Dropped finished jobs past retention");
        }
        jobs.create_job(documents_count)
    };
    info!(job_id = %job_id, documents = documents_count, "Received ingest request");

    let processor = JobProcessor::new(Arc::clone(&state.pipeline));
    let job_store = Arc::clone(&state.job_store);
    tokio::spawn(async move {
        processor.process_job(job_id, request, job_store).await;
    });

    Json(StartIngestResponse {
        job_id,
        accepted: true,
        documents_count,
        message: None,
    })
}

pub async fn get_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    state
        .job_store
        .read()
        .await
        .get_job_status(job_id)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("job not found: {}", job_id)))
}

/// Request cancellation of a running job.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.job_store.write().await.cancel_job(job_id) {
        info!(job_id = %job_id, "Job cancellation requested");
        Ok(StatusCode::ACCEPTED)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            format!("no running job with id {}", job_id),
        ))
    }
}

pub async fn list_documents(State(state): State<Arc<AppState>>) -> Json<Vec<DocumentSummary>> {
    Json(state.chunk_store.list().await)
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> Result<Json<ChunkFile>, ApiError> {
    state
        .chunk_store
        .get(document_id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, StoreError::NotFound(document_id).to_string()))
}

/// Delete a document and all of its chunks.
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .chunk_store
        .delete(document_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| (store_status(&e), e.to_string()))
}

/// Search request.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Explicit keywords; enables hybrid retrieval
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    /// Restrict the search to one document
    #[serde(default)]
    pub document_id: Option<Uuid>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<QueryOutcome>, ApiError> {
    let Some(engine) = &state.query_engine else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "no embedding service configured".to_string(),
        ));
    };
    if request.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "question must not be empty".to_string()));
    }

    let chunks = state
        .chunk_store
        .chunks(request.document_id)
        .await
        .map_err(|e| (store_status(&e), e.to_string()))?;

    engine
        .query(&chunks, &request.question, request.top_k, request.keywords)
        .await
        .map(Json)
        .map_err(|e| {
            warn!(error = %e, "Search failed");
            (retrieval_status(&e), e.to_string())
        })
}

/// Chunker listing entry.
#[derive(Debug, Serialize)]
pub struct ChunkerInfo {
    name: String,
    description: String,
}

pub async fn list_chunkers(State(state): State<Arc<AppState>>) -> Json<Vec<ChunkerInfo>> {
    let chunkers = state
        .router
        .list_chunkers()
        .into_iter()
        .map(|(name, description)| ChunkerInfo {
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect();

    Json(chunkers)
}

/// List available profiles.
pub async fn list_profiles() -> Json<Vec<ChunkingProfile>> {
    Json(ChunkingProfile::defaults())
}

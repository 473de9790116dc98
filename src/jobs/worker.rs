//! Worker pool with correlated request/response messages.
//!
//! Requests go onto a shared queue drained by a fixed number of worker
//! tasks. Every request produces zero or more `progress` responses followed
//! by exactly one terminal `success`, `error` or `cancelled` response, all
//! carrying the request's `id`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::processor::UploadPipeline;
use crate::cancel::CancellationToken;
use crate::error::{EmbeddingError, PipelineError};
use crate::types::SourceDocument;

/// Work a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerTask {
    /// `data` is a [`SourceDocument`]; success data is the chunk list
    Chunk,
    /// `data` is `{"texts": [..]}`; success data is `{"embeddings": [..]}`
    Embed,
    /// `data` is a [`SourceDocument`]; success data is the saved chunk file
    Ingest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    #[serde(rename = "type")]
    pub task: WorkerTask,
    pub data: Value,
    pub id: Uuid,
}

impl WorkerRequest {
    pub fn new(task: WorkerTask, data: Value) -> Self {
        Self {
            task,
            data,
            id: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Progress,
    Success,
    Error,
    Cancelled,
}

impl ResponseKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseKind::Progress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub data: Value,
    pub id: Uuid,
}

/// Outcome of one request before it is wrapped in a response.
enum TaskOutcome {
    Success(Value),
    Error(String),
    Cancelled,
}

struct Shared {
    pipeline: Arc<UploadPipeline>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
    in_flight: Mutex<HashMap<Uuid, CancellationToken>>,
}

/// Fixed-size pool of worker tasks.
pub struct WorkerPool {
    queue: Option<mpsc::UnboundedSender<WorkerRequest>>,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks. Responses for all requests arrive on the
    /// returned receiver.
    pub fn spawn(
        workers: usize,
        pipeline: Arc<UploadPipeline>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerResponse>) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let shared = Arc::new(Shared {
            pipeline,
            responses: response_tx,
            in_flight: Mutex::new(HashMap::new()),
        });

        let count = workers.max(1);
        let handles = (0..count)
            .map(|worker| {
                let queue_rx = Arc::clone(&queue_rx);
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    loop {
                        let next = queue_rx.lock().await.recv().await;
                        let Some(request) = next else { break };
                        debug!(worker, id = %request.id, task = ?request.task, "Worker picked up request");
                        shared.handle(request).await;
                    }
                    debug!(worker, "Worker stopped");
                })
            })
            .collect();

        info!(workers = count, "Worker pool started");
        (
            Self {
                queue: Some(queue_tx),
                shared,
                workers: handles,
            },
            response_rx,
        )
    }

    /// Queue a request and return its id.
    ///
    /// A request submitted after [`Self::shutdown`] is answered with an
    /// `error` response.
    pub async fn submit(&self, request: WorkerRequest) -> Uuid {
        let id = request.id;
        self.shared
            .in_flight
            .lock()
            .await
            .insert(id, CancellationToken::new());

        let rejected = match &self.queue {
            Some(queue) => queue.send(request).err().map(|e| e.0),
            None => Some(request),
        };
        if let Some(request) = rejected {
            self.shared.in_flight.lock().await.remove(&request.id);
            self.shared
                .respond(ResponseKind::Error, json!({ "message": "worker pool is shut down" }), id);
        }
        id
    }

    /// Cancel a queued or running request. Returns false if it already
    /// finished or was never submitted.
    pub async fn cancel(&self, id: Uuid) -> bool {
        match self.shared.in_flight.lock().await.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop accepting requests and wait for queued work to drain.
    pub async fn shutdown(mut self) {
        self.queue.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task panicked");
            }
        }
    }
}

impl Shared {
    fn respond(&self, kind: ResponseKind, data: Value, id: Uuid) {
        if self.responses.send(WorkerResponse { kind, data, id }).is_err() {
            debug!(%id, "Response receiver dropped");
        }
    }

    async fn handle(&self, request: WorkerRequest) {
        let id = request.id;
        let cancel = self
            .in_flight
            .lock()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default();

        let outcome = if cancel.is_cancelled() {
            TaskOutcome::Cancelled
        } else {
            match request.task {
                WorkerTask::Chunk => self.chunk(request.data, &cancel).await,
                WorkerTask::Embed => self.embed(request.data, id, &cancel).await,
                WorkerTask::Ingest => self.ingest(request.data, id, &cancel).await,
            }
        };

        self.in_flight.lock().await.remove(&id);
        match outcome {
            TaskOutcome::Success(data) => self.respond(ResponseKind::Success, data, id),
            TaskOutcome::Error(message) => {
                self.respond(ResponseKind::Error, json!({ "message": message }), id)
            }
            TaskOutcome::Cancelled => self.respond(ResponseKind::Cancelled, Value::Null, id),
        }
    }

    async fn chunk(&self, data: Value, cancel: &CancellationToken) -> TaskOutcome {
        let document: SourceDocument = match serde_json::from_value(data) {
            Ok(document) => document,
            Err(e) => return TaskOutcome::Error(format!("invalid document: {}", e)),
        };
        match self.pipeline.chunk(&document, cancel).await {
            Ok((_, chunks)) => to_success(&chunks),
            Err(PipelineError::Cancelled) => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Error(e.to_string()),
        }
    }

    async fn embed(&self, data: Value, id: Uuid, cancel: &CancellationToken) -> TaskOutcome {
        #[derive(Deserialize)]
        struct EmbedData {
            texts: Vec<String>,
        }

        let Some(embedder) = self.pipeline.embedder() else {
            return TaskOutcome::Error("no embedding service configured".to_string());
        };
        let texts = match serde_json::from_value::<EmbedData>(data) {
            Ok(d) => d.texts,
            Err(e) => return TaskOutcome::Error(format!("invalid embed request: {}", e)),
        };

        let result = embedder
            .embed_batch(
                &texts,
                |progress| self.respond(ResponseKind::Progress, json!(progress), id),
                cancel,
            )
            .await;
        match result {
            Ok(embeddings) => TaskOutcome::Success(json!({ "embeddings": embeddings })),
            Err(EmbeddingError::Cancelled) => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Error(e.to_string()),
        }
    }

    async fn ingest(&self, data: Value, id: Uuid, cancel: &CancellationToken) -> TaskOutcome {
        let document: SourceDocument = match serde_json::from_value(data) {
            Ok(document) => document,
            Err(e) => return TaskOutcome::Error(format!("invalid document: {}", e)),
        };
        let result = self
            .pipeline
            .run(
                &document,
                |progress| self.respond(ResponseKind::Progress, json!(progress), id),
                cancel,
            )
            .await;
        match result {
            Ok(file) => to_success(&file),
            Err(PipelineError::Cancelled) => TaskOutcome::Cancelled,
            Err(e) => TaskOutcome::Error(e.to_string()),
        }
    }
}

fn to_success<T: Serialize>(value: &T) -> TaskOutcome {
    match serde_json::to_value(value) {
        Ok(data) => TaskOutcome::Success(data),
        Err(e) => TaskOutcome::Error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingPipeline, MockEmbedder};
    use crate::router::ChunkingRouter;
    use crate::store::ChunkStore;
    use crate::types::{ChunkingConfig, EmbeddingConfig};

    fn pool(workers: usize) -> (WorkerPool, mpsc::UnboundedReceiver<WorkerResponse>) {
        let embedder = Arc::new(EmbeddingPipeline::new(
            Arc::new(MockEmbedder::new()),
            EmbeddingConfig::default().with_batch_size(2),
        ));
        let pipeline = UploadPipeline::new(
            Arc::new(ChunkingRouter::new(&ChunkingConfig::default())),
            Some(embedder),
            Arc::new(ChunkStore::in_memory()),
        );
        WorkerPool::spawn(workers, Arc::new(pipeline))
    }

    /// Collect responses until every id in `ids` has its terminal response.
    async fn collect(
        rx: &mut mpsc::UnboundedReceiver<WorkerResponse>,
        ids: &[Uuid],
    ) -> HashMap<Uuid, Vec<WorkerResponse>> {
        let mut by_id: HashMap<Uuid, Vec<WorkerResponse>> = HashMap::new();
        let mut done = 0;
        while done < ids.len() {
            let response = rx.recv().await.unwrap();
            if response.kind.is_terminal() {
                done += 1;
            }
            by_id.entry(response.id).or_default().push(response);
        }
        by_id
    }

    fn document_json() -> Value {
        serde_json::to_value(SourceDocument::new(
            "order.txt",
            "The motion to dismiss is denied. The defendant shall answer within fourteen days.",
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_single_terminal_response_per_request() {
        let (pool, mut rx) = pool(3);
        let mut ids = Vec::new();
        for i in 0..4 {
            let texts: Vec<String> = (0..5).map(|j| format!("text {} {}", i, j)).collect();
            ids.push(
                pool.submit(WorkerRequest::new(WorkerTask::Embed, json!({ "texts": texts })))
                    .await,
            );
        }
        ids.push(pool.submit(WorkerRequest::new(WorkerTask::Chunk, document_json())).await);
        ids.push(pool.submit(WorkerRequest::new(WorkerTask::Ingest, document_json())).await);

        let by_id = collect(&mut rx, &ids).await;
        for id in &ids {
            let responses = &by_id[id];
            let terminal: Vec<_> = responses.iter().filter(|r| r.kind.is_terminal()).collect();
            assert_eq!(terminal.len(), 1);
            assert_eq!(responses.last().unwrap().kind, ResponseKind::Success);
        }

        // 5 texts in batches of 2: three progress messages.
        let progress = by_id[&ids[0]]
            .iter()
            .filter(|r| r.kind == ResponseKind::Progress)
            .count();
        assert_eq!(progress, 3);
        assert_eq!(by_id[&ids[0]].last().unwrap().data["embeddings"].as_array().unwrap().len(), 5);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_payload_is_an_error_response() {
        let (pool, mut rx) = pool(1);
        let id = pool
            .submit(WorkerRequest::new(WorkerTask::Embed, json!({ "wrong": true })))
            .await;
        let response = rx.recv().await.unwrap();
        assert_eq!(response.id, id);
        assert_eq!(response.kind, ResponseKind::Error);
        assert!(response.data["message"].as_str().unwrap().contains("invalid embed request"));
    }

    #[tokio::test]
    async fn test_cancel_queued_request() {
        // One worker, so the second request waits behind the first.
        let (pool, mut rx) = pool(1);
        let texts: Vec<String> = (0..50).map(|j| format!("text {}", j)).collect();
        let first = pool
            .submit(WorkerRequest::new(WorkerTask::Embed, json!({ "texts": texts })))
            .await;
        let second = pool.submit(WorkerRequest::new(WorkerTask::Chunk, document_json())).await;
        assert!(pool.cancel(second).await);

        let by_id = collect(&mut rx, &[first, second]).await;
        assert_eq!(by_id[&second].len(), 1);
        assert_eq!(by_id[&second][0].kind, ResponseKind::Cancelled);
        assert!(!pool.cancel(second).await);
    }

    #[test]
    fn test_wire_shape() {
        let request = WorkerRequest::new(WorkerTask::Ingest, json!({}));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "ingest");
        assert!(value["id"].is_string());

        let response: WorkerResponse = serde_json::from_value(json!({
            "type": "cancelled",
            "data": null,
            "id": request.id,
        }))
        .unwrap();
        assert_eq!(response.kind, ResponseKind::Cancelled);
    }
}

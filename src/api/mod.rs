//! HTTP surface of the service.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Ingest jobs
        .route("/documents", post(handlers::start_ingest).get(handlers::list_documents))
        .route("/jobs/:job_id", get(handlers::get_job_status))
        .route("/jobs/:job_id/cancel", post(handlers::cancel_job))
        // Stored documents
        .route(
            "/documents/:document_id",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        // Retrieval
        .route("/search", post(handlers::search))
        // Introspection
        .route("/chunkers", get(handlers::list_chunkers))
        .route("/profiles", get(handlers::list_profiles))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::store::ChunkStore;
    use crate::types::{
        Chunk, ChunkFile, ChunkType, ChunkingConfig, ChunkingStrategy, JobStatus,
    };
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn state(with_embedder: bool) -> Arc<AppState> {
        let embedder = with_embedder
            .then(|| Arc::new(MockEmbedder::new()) as Arc<dyn crate::embedding::EmbeddingService>);
        Arc::new(AppState::new(
            ChunkingConfig::default(),
            Arc::new(ChunkStore::in_memory()),
            embedder,
        ))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn seed(state: &AppState) -> Uuid {
        let chunks = vec![
            Chunk::new("The motion to suppress is denied.".into(), ChunkType::Paragraph, 4)
                .with_embedding(vec![1.0, 0.0, 0.0]),
            Chunk::new("The warrant was supported by probable cause.".into(), ChunkType::Paragraph, 4)
                .with_embedding(vec![0.0, 1.0, 0.0]),
        ];
        let file = ChunkFile::new(Uuid::new_v4(), "order.txt", ChunkingStrategy::Sentence, chunks);
        let id = file.document_id;
        state.chunk_store.save(file).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(build_router(state(false)), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["embedding"], false);
    }

    #[tokio::test]
    async fn test_ingest_job_completes() {
        let state = state(true);
        let request = json!({
            "documents": [{
                "filename": "opinion.txt",
                "text": "The court reviewed the record in full. The judgment is affirmed."
            }]
        });
        let (status, body) = send(build_router(state.clone()), "POST", "/documents", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], true);
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let mut final_status = Value::Null;
        for _ in 0..100 {
            let (_, body) = send(build_router(state.clone()), "GET", &format!("/jobs/{}", job_id), None).await;
            if body["status"] != "pending" && body["status"] != "running" {
                final_status = body;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(final_status["status"], json!(JobStatus::Completed));

        let (_, documents) = send(build_router(state), "GET", "/documents", None).await;
        assert_eq!(documents.as_array().unwrap().len(), 1);
    }

    async fn wait_for_job(state: &Arc<AppState>, job_id: &str) -> Value {
        for _ in 0..100 {
            let (_, body) = send(build_router(state.clone()), "GET", &format!("/jobs/{}", job_id), None).await;
            if body["status"] != "pending" && body["status"] != "running" {
                return body;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        Value::Null
    }

    #[tokio::test]
    async fn test_finished_jobs_expire_on_next_ingest() {
        let config = ChunkingConfig {
            job_retention_secs: 0,
            ..ChunkingConfig::default()
        };
        let state = Arc::new(AppState::new(config, Arc::new(ChunkStore::in_memory()), None));
        let request = json!({
            "documents": [{
                "filename": "opinion.txt",
                "text": "The court reviewed the record in full. The judgment is affirmed."
            }]
        });

        let (_, first) = send(build_router(state.clone()), "POST", "/documents", Some(request.clone())).await;
        let first_id = first["job_id"].as_str().unwrap().to_string();
        assert_eq!(wait_for_job(&state, &first_id).await["status"], json!(JobStatus::Completed));

        let (_, health) = send(build_router(state.clone()), "GET", "/health", None).await;
        assert_eq!(health["jobs"]["completed"], 1);

        send(build_router(state.clone()), "POST", "/documents", Some(request)).await;
        let (status, _) = send(build_router(state), "GET", &format!("/jobs/{}", first_id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_ingest_is_not_accepted() {
        let (status, body) =
            send(build_router(state(false)), "POST", "/documents", Some(json!({ "documents": [] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], false);
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let uri = format!("/jobs/{}", Uuid::new_v4());
        let (status, _) = send(build_router(state(false)), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_and_status_mapping() {
        let state = state(true);
        seed(&state).await;

        let (status, body) = send(
            build_router(state.clone()),
            "POST",
            "/search",
            Some(json!({ "question": "Was the warrant valid?", "top_k": 1, "keywords": ["warrant"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["context"].as_str().unwrap().starts_with("[1] "));
        assert_eq!(body["keywords"], json!(["warrant"]));

        let (status, _) = send(
            build_router(state),
            "POST",
            "/search",
            Some(json!({ "question": "q", "top_k": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_without_embedder_is_503() {
        let (status, _) = send(
            build_router(state(false)),
            "POST",
            "/search",
            Some(json!({ "question": "q" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let state = state(false);
        let id = seed(&state).await;
        let uri = format!("/documents/{}", id);

        let (status, body) = send(build_router(state.clone()), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunkCount"], 2);

        let (status, _) = send(build_router(state.clone()), "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(build_router(state), "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_chunkers() {
        let (_, body) = send(build_router(state(false)), "GET", "/chunkers", None).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["sentence", "token"]);
    }
}

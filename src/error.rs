//! Error types for docket.

use thiserror::Error;
use uuid::Uuid;

use crate::types::{Chunk, PipelineStage};

/// Chunking errors.
///
/// Bad or empty input never produces one of these; only configuration that
/// makes chunking impossible does.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("chunking cancelled")]
    Cancelled,

    /// A background chunking task panicked or could not be scheduled.
    #[error("chunking task failed: {0}")]
    Task(String),
}

/// Embedding errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding failed for item {index} after {attempts} attempts: {message}")]
    RetriesExhausted {
        index: usize,
        attempts: u32,
        message: String,
    },

    #[error("embedding cancelled")]
    Cancelled,
}

impl EmbeddingError {
    /// Whether this error ends the batch without retrying.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EmbeddingError::Cancelled)
    }

    /// Whether the service could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EmbeddingError::Unavailable(_))
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            EmbeddingError::Unavailable(err.to_string())
        } else if err.is_decode() {
            EmbeddingError::InvalidResponse(err.to_string())
        } else {
            EmbeddingError::Request(err.to_string())
        }
    }
}

/// Retrieval errors. These indicate a missing pipeline step or a caller
/// mistake, never bad document data.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("no chunk has an embedding; embed the document before semantic search")]
    NoEmbeddings,

    #[error("top_k {top_k} out of range 1..={max}")]
    TopKOutOfRange { top_k: usize, max: usize },

    #[error("question embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("keyword extraction failed: {0}")]
    KeywordExtraction(String),

    #[error("answer generation failed: {0}")]
    AnswerGeneration(String),
}

/// Chunk store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(Uuid),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Upload pipeline errors, tagged with the stage that failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} stage failed: {message}")]
    Stage {
        stage: PipelineStage,
        message: String,
        /// Chunks produced by stages that completed before the failure.
        partial_chunks: Vec<Chunk>,
    },

    #[error("upload cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Create a stage failure without partial output.
    pub fn stage(stage: PipelineStage, message: impl Into<String>) -> Self {
        PipelineError::Stage {
            stage,
            message: message.into(),
            partial_chunks: Vec::new(),
        }
    }

    /// The failing stage, if this is not a cancellation.
    pub fn failed_stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            PipelineError::Cancelled => None,
        }
    }
}

/// Main error type for docket operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type alias for docket operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_display() {
        let err = EmbeddingError::RetriesExhausted {
            index: 3,
            attempts: 4,
            message: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "embedding failed for item 3 after 4 attempts: timeout"
        );
    }

    #[test]
    fn test_top_k_display() {
        let err = RetrievalError::TopKOutOfRange { top_k: 0, max: 50 };
        assert_eq!(err.to_string(), "top_k 0 out of range 1..=50");
    }

    #[test]
    fn test_pipeline_stage_display() {
        let err = PipelineError::stage(PipelineStage::Embedding, "service down");
        assert_eq!(err.to_string(), "embedding stage failed: service down");
        assert_eq!(err.failed_stage(), Some(PipelineStage::Embedding));
        assert_eq!(PipelineError::Cancelled.failed_stage(), None);
    }

    #[test]
    fn test_cancelled_is_distinct() {
        assert!(EmbeddingError::Cancelled.is_cancelled());
        assert!(!EmbeddingError::Request("x".into()).is_cancelled());
    }
}

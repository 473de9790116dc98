//! Core types for the segmentation and retrieval service.

mod chunk;
mod config;
mod document;
mod retrieval;
mod source;

pub use chunk::{estimate_tokens, Chunk, ChunkMetadata, ChunkType, PageSpan};
pub use config::{ChunkConfig, ChunkingConfig, ChunkingProfile, EmbeddingConfig, RetrievalConfig};
pub use document::ChunkFile;
pub use retrieval::{
    normalize_terms, KeywordEntry, KeywordExtraction, KeywordMatch, MatchType, RetrievalResult,
};
pub use source::{
    ChunkingStrategy, JobStatus, JobStatusResponse, PipelineStage, SourceDocument,
    StartIngestRequest, StartIngestResponse, PAGE_SEPARATOR,
};

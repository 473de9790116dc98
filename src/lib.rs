//! docket
//!
//! Segments extracted court and legal document text into bounded, coherent
//! chunks, attaches embeddings, and retrieves chunks for a question with
//! semantic, keyword and hybrid search.

pub mod api;
pub mod batch;
pub mod cancel;
pub mod chunkers;
pub mod embedding;
pub mod error;
pub mod jobs;
pub mod retrieval;
pub mod router;
pub mod store;
pub mod text;
pub mod types;

pub use batch::{BatchConfig, BatchProcessor, BatchResult};
pub use cancel::CancellationToken;
pub use chunkers::{Chunker, SentenceChunker, TokenChunker};
pub use error::{Error, Result};
pub use retrieval::QueryEngine;
pub use router::ChunkingRouter;
pub use store::ChunkStore;
pub use types::{Chunk, ChunkConfig, ChunkMetadata, ChunkType, SourceDocument};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::chunkers::{Chunker, SentenceChunker, TokenChunker};
    pub use crate::embedding::{EmbeddingPipeline, EmbeddingService};
    pub use crate::retrieval::*;
    pub use crate::router::ChunkingRouter;
    pub use crate::types::*;
}

/// Default chunk size in tokens
pub const DEFAULT_TARGET_TOKENS: usize = 512;

/// Chunks below this estimate are merged into a neighbour
pub const DEFAULT_MIN_TOKENS: usize = 50;

/// Default token-chunk overlap in tokens
pub const DEFAULT_OVERLAP_TOKENS: usize = 50;

/// Characters per estimated token
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Sentences per sliding window
pub const DEFAULT_WINDOW_SIZE: usize = 8;

/// Sentences shared by consecutive windows
pub const DEFAULT_WINDOW_OVERLAP: usize = 2;

/// Similarity above which a chunk counts as a near duplicate
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.85;

/// Upper bound for a caller's top-K
pub const DEFAULT_MAX_TOP_K: usize = 50;

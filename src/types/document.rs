//! Persisted chunk file shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Chunk, ChunkingStrategy};

/// All chunks of one uploaded document, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFile {
    /// Document id the chunks belong to
    pub document_id: Uuid,

    pub original_filename: String,

    pub uploaded_at: DateTime<Utc>,

    pub chunking_strategy: ChunkingStrategy,

    pub chunk_count: usize,

    pub chunks: Vec<Chunk>,
}

impl ChunkFile {
    /// Bundle chunks for a document uploaded now.
    pub fn new(
        document_id: Uuid,
        original_filename: &str,
        chunking_strategy: ChunkingStrategy,
        chunks: Vec<Chunk>,
    ) -> Self {
        Self {
            document_id,
            original_filename: original_filename.to_string(),
            uploaded_at: Utc::now(),
            chunking_strategy,
            chunk_count: chunks.len(),
            chunks,
        }
    }

    /// Number of chunks that carry an embedding.
    pub fn embedded_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.embedding.is_some()).count()
    }
}

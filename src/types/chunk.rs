//! Chunk type definitions.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a chunk was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// A paragraph of 3-7 sentences kept whole
    Paragraph,
    /// One window of a long paragraph
    SlidingWindow,
    /// Short paragraphs buffered together before chunking
    Merged,
    /// Fixed-size character window from the token chunker
    TokenWindow,
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkType::Paragraph => write!(f, "paragraph"),
            ChunkType::SlidingWindow => write!(f, "sliding_window"),
            ChunkType::Merged => write!(f, "merged"),
            ChunkType::TokenWindow => write!(f, "token_window"),
        }
    }
}

/// A chunk of document text.
///
/// Chunks are the unit that gets embedded and retrieved. Once embeddings are
/// attached a chunk is never modified again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique identifier for this chunk
    pub id: Uuid,

    /// The chunk text
    pub text: String,

    /// How the chunk was produced
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,

    /// Source ranges and bookkeeping
    pub metadata: ChunkMetadata,

    /// Embedding vector (attached after chunking); `null` until then
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a new chunk with a fresh id and an estimated token count.
    pub fn new(text: String, chunk_type: ChunkType, chars_per_token: usize) -> Self {
        let mut metadata = ChunkMetadata::default();
        metadata.token_count = estimate_tokens(&text, chars_per_token);
        Self {
            id: Uuid::new_v4(),
            text,
            chunk_type,
            metadata,
            embedding: None,
        }
    }

    /// Replace the metadata, keeping the token estimate.
    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        let token_count = self.metadata.token_count;
        self.metadata = metadata;
        self.metadata.token_count = token_count;
        self
    }

    /// Attach an embedding vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Length of the chunk text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Check if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Start character offset in the cleaned document text.
    pub fn start_char(&self) -> usize {
        self.metadata.char_range.start
    }
}

/// Metadata associated with a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Position of this chunk within its document (0-indexed)
    pub chunk_index: usize,

    /// Source paragraphs (after fragment merging), end exclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_range: Option<Range<usize>>,

    /// Sentences within the paragraph run, end exclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_range: Option<Range<usize>>,

    /// Character range in the cleaned document text
    pub char_range: Range<usize>,

    /// Estimated token range (token chunker only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_range: Option<Range<usize>>,

    /// Id of the preceding chunk this one overlaps with
    pub overlap_with: Option<Uuid>,

    /// Pages covered, for paginated input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_span: Option<PageSpan>,

    /// Estimated token count
    pub token_count: usize,
}

/// First and last page (1-based, inclusive) a chunk touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub start: usize,
    pub end: usize,
}

/// Estimate the token count of `text` from its character length.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
    let chars = text.chars().count();
    let per = chars_per_token.max(1);
    (chars + per - 1) / per
}

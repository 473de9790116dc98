//! Chunking strategies.

mod base;
mod sentence_chunker;
mod token_chunker;

pub use base::{join_without_overlap, merge_undersized, Chunker};
pub use sentence_chunker::{ChunkSession, SentenceChunker};
pub use token_chunker::TokenChunker;

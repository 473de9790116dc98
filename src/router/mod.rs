//! Chunking strategy router.

use std::sync::Arc;

use crate::chunkers::{Chunker, SentenceChunker, TokenChunker};
use crate::types::{ChunkConfig, ChunkingConfig, ChunkingStrategy, SourceDocument};

/// Router that selects the chunker for a document.
///
/// An explicit strategy on the document wins. Otherwise paginated input and
/// PDFs go to the token chunker, whose fixed windows tolerate page layout,
/// and everything else goes to the sentence chunker.
pub struct ChunkingRouter {
    /// Token chunker (paginated input)
    token_chunker: Arc<TokenChunker>,
    /// Sentence chunker (plain text)
    sentence_chunker: Arc<SentenceChunker>,
    /// Default chunk configuration
    default_config: ChunkConfig,
}

impl ChunkingRouter {
    /// Create a new chunking router with the given configuration.
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            token_chunker: Arc::new(TokenChunker::new()),
            sentence_chunker: Arc::new(SentenceChunker::new()),
            default_config: config.chunk_config(),
        }
    }

    /// Decide which strategy applies to `document`.
    pub fn strategy_for(&self, document: &SourceDocument) -> ChunkingStrategy {
        if let Some(strategy) = document.strategy {
            return strategy;
        }
        if document.is_paginated() || document.content_type.contains("pdf") {
            ChunkingStrategy::Token
        } else {
            ChunkingStrategy::Sentence
        }
    }

    /// Get the appropriate chunker for the given document.
    pub fn get_chunker(&self, document: &SourceDocument) -> Arc<dyn Chunker> {
        self.chunker_for(self.strategy_for(document))
    }

    /// Get the chunker implementing `strategy`.
    pub fn chunker_for(&self, strategy: ChunkingStrategy) -> Arc<dyn Chunker> {
        match strategy {
            ChunkingStrategy::Token => Arc::clone(&self.token_chunker) as Arc<dyn Chunker>,
            ChunkingStrategy::Sentence => Arc::clone(&self.sentence_chunker) as Arc<dyn Chunker>,
        }
    }

    /// The sentence chunker, for callers that drive it asynchronously.
    pub fn sentence_chunker(&self) -> Arc<SentenceChunker> {
        Arc::clone(&self.sentence_chunker)
    }

    /// The token chunker, for callers that drive it asynchronously.
    pub fn token_chunker(&self) -> Arc<TokenChunker> {
        Arc::clone(&self.token_chunker)
    }

    /// Get the default chunk configuration.
    pub fn default_config(&self) -> &ChunkConfig {
        &self.default_config
    }

    /// Get a chunker by name.
    pub fn get_chunker_by_name(&self, name: &str) -> Option<Arc<dyn Chunker>> {
        match name.to_lowercase().as_str() {
            "token" | "fixed" => Some(self.chunker_for(ChunkingStrategy::Token)),
            "sentence" | "hybrid" | "paragraph" => Some(self.chunker_for(ChunkingStrategy::Sentence)),
            _ => None,
        }
    }

    /// List all available chunkers.
    pub fn list_chunkers(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            (self.sentence_chunker.name(), self.sentence_chunker.description()),
            (self.token_chunker.name(), self.token_chunker.description()),
        ]
    }
}

impl Default for ChunkingRouter {
    fn default() -> Self {
        Self::new(&ChunkingConfig::default())
    }
}

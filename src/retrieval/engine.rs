//! Question answering over a document's chunks.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::hybrid::{build_context, merge_hybrid};
use super::keyword::{keyword_search, normalize_terms};
use super::semantic::{rank, validate_top_k};
use crate::embedding::EmbeddingService;
use crate::error::RetrievalError;
use crate::types::{Chunk, KeywordExtraction, RetrievalConfig, RetrievalResult};

/// Default instructions handed to the answer generator.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Answer the question using only the numbered \
context passages. Cite passages by their number. If the context does not contain \
the answer, say so.";

/// Extracts search keywords (and their variations) from a question.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn extract(&self, question: &str) -> Result<KeywordExtraction, RetrievalError>;
}

/// Turns retrieved context into an answer.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(
        &self,
        system_prompt: &str,
        context: &str,
        question: &str,
    ) -> Result<String, RetrievalError>;
}

/// Everything a query produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub results: Vec<RetrievalResult>,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Lower-cased keyword set used for the keyword half, empty for
    /// semantic-only queries
    pub keywords: Vec<String>,
}

/// Embeds questions and runs semantic or hybrid retrieval.
pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingService>,
    keyword_extractor: Option<Arc<dyn KeywordExtractor>>,
    answer_generator: Option<Arc<dyn AnswerGenerator>>,
    config: RetrievalConfig,
    system_prompt: String,
}

impl QueryEngine {
    pub fn new(embedder: Arc<dyn EmbeddingService>, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            keyword_extractor: None,
            answer_generator: None,
            config,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_keyword_extractor(mut self, extractor: Arc<dyn KeywordExtractor>) -> Self {
        self.keyword_extractor = Some(extractor);
        self
    }

    pub fn with_answer_generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.answer_generator = Some(generator);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Embed the question and return the semantic top `top_k`.
    pub async fn semantic(
        &self,
        chunks: &[Chunk],
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        validate_top_k(top_k, self.config.max_top_k)?;
        let query = self.embedder.embed(question).await?;
        rank(chunks, &query, top_k, self.config.dedup_threshold)
    }

    /// Run a full query.
    ///
    /// Explicit `keywords` take precedence over the keyword extractor. With
    /// keywords the retrieval is hybrid: the semantic half uses the larger
    /// `hybrid_semantic_k` limit and keyword matches are appended. Without
    /// keywords it is semantic-only with `top_k` (the configured default when
    /// `None`). A failing keyword extractor degrades to semantic-only.
    pub async fn query(
        &self,
        chunks: &[Chunk],
        question: &str,
        top_k: Option<usize>,
        keywords: Option<Vec<String>>,
    ) -> Result<QueryOutcome, RetrievalError> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        validate_top_k(top_k, self.config.max_top_k)?;

        let keywords = match keywords {
            Some(explicit) => normalize_terms(&explicit),
            None => self.extract_keywords(question).await,
        };

        let query = self.embedder.embed(question).await?;

        let results = if keywords.is_empty() {
            rank(chunks, &query, top_k, self.config.dedup_threshold)?
        } else {
            let semantic = rank(
                chunks,
                &query,
                self.config.hybrid_semantic_k.max(top_k),
                self.config.dedup_threshold,
            )?;
            let keyword = keyword_search(chunks, &keywords);
            debug!(
                semantic = semantic.len(),
                keyword = keyword.len(),
                "Merging hybrid results"
            );
            merge_hybrid(semantic, keyword)
        };

        let context = build_context(&results);
        let answer = match &self.answer_generator {
            Some(generator) => Some(
                generator
                    .answer(&self.system_prompt, &context, question)
                    .await?,
            ),
            None => None,
        };

        info!(
            results = results.len(),
            hybrid = !keywords.is_empty(),
            answered = answer.is_some(),
            "Query complete"
        );

        Ok(QueryOutcome {
            results,
            context,
            answer,
            keywords,
        })
    }

    async fn extract_keywords(&self, question: &str) -> Vec<String> {
        let Some(extractor) = &self.keyword_extractor else {
            return Vec::new();
        };
        match extractor.extract(question).await {
            Ok(extraction) => extraction.flatten(),
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, using semantic retrieval only");
                Vec::new()
            }
        }
    }
}

//! Configuration types for chunking, embedding and retrieval.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChunkError;
use crate::{
    DEFAULT_CHARS_PER_TOKEN, DEFAULT_DEDUP_THRESHOLD, DEFAULT_MAX_TOP_K, DEFAULT_MIN_TOKENS,
    DEFAULT_OVERLAP_TOKENS, DEFAULT_TARGET_TOKENS, DEFAULT_WINDOW_OVERLAP, DEFAULT_WINDOW_SIZE,
};

/// Global service configuration.
///
/// Loaded from defaults overlaid with `DOCKET_*` environment variables, e.g.
/// `DOCKET_TARGET_TOKENS=256` or `DOCKET_EMBEDDING_SERVICE_URL=http://...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Desired token chunk size
    pub target_tokens: usize,

    /// Hard upper bound for a token chunk
    pub max_tokens: usize,

    /// Chunks below this estimate are merged into a neighbour
    pub min_tokens: usize,

    /// Overlap between successive token chunks
    pub overlap_tokens: usize,

    /// Characters per estimated token
    pub chars_per_token: usize,

    /// Sentences per sliding window
    pub window_size: usize,

    /// Sentences shared by successive windows
    pub window_overlap: usize,

    /// Cosine similarity above which a chunk counts as a near duplicate
    pub dedup_threshold: f32,

    /// Largest accepted top_k
    pub max_top_k: usize,

    /// top_k used when a request does not give one
    pub default_top_k: usize,

    /// Semantic results fetched before the hybrid merge
    pub hybrid_semantic_k: usize,

    /// URL of the embedding service
    pub embedding_service_url: Option<String>,

    /// Texts per embedding batch
    pub embedding_batch_size: usize,

    /// Retries per text after the first attempt
    pub embedding_max_retries: u32,

    /// Fixed delay between retries in milliseconds
    pub embedding_retry_delay_ms: u64,

    /// Directory for persisted chunk files
    pub data_dir: Option<String>,

    /// Maximum documents chunked concurrently
    pub max_concurrent_jobs: usize,

    /// Worker tasks in the chunking pool
    pub worker_count: usize,

    /// Seconds a finished job stays queryable
    pub job_retention_secs: u64,

    /// Active chunking profile name
    pub active_profile: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: DEFAULT_TARGET_TOKENS,
            max_tokens: DEFAULT_TARGET_TOKENS * 2,
            min_tokens: DEFAULT_MIN_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            window_size: DEFAULT_WINDOW_SIZE,
            window_overlap: DEFAULT_WINDOW_OVERLAP,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            max_top_k: DEFAULT_MAX_TOP_K,
            default_top_k: 5,
            hybrid_semantic_k: 100,
            embedding_service_url: None,
            embedding_batch_size: 16,
            embedding_max_retries: 3,
            embedding_retry_delay_ms: 500,
            data_dir: None,
            max_concurrent_jobs: 4,
            worker_count: 2,
            job_retention_secs: 3600,
            active_profile: "default".to_string(),
        }
    }
}

impl ChunkingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("DOCKET").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Per-document chunking parameters.
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            target_tokens: self.target_tokens,
            max_tokens: self.max_tokens,
            min_tokens: self.min_tokens,
            overlap_tokens: self.overlap_tokens,
            chars_per_token: self.chars_per_token,
            window_size: self.window_size,
            window_overlap: self.window_overlap,
            ..Default::default()
        }
    }

    /// Retrieval parameters.
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            dedup_threshold: self.dedup_threshold,
            max_top_k: self.max_top_k,
            default_top_k: self.default_top_k,
            hybrid_semantic_k: self.hybrid_semantic_k,
        }
    }

    /// Embedding pipeline parameters.
    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            batch_size: self.embedding_batch_size,
            max_retries: self.embedding_max_retries,
            retry_delay: Duration::from_millis(self.embedding_retry_delay_ms),
        }
    }

    /// How long finished jobs are kept.
    pub fn job_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_retention_secs.min(u64::from(u32::MAX)) as i64)
    }

    /// Apply a named profile's sizes on top of this configuration.
    pub fn apply_profile(&mut self, profile: &ChunkingProfile) {
        self.target_tokens = profile.target_tokens;
        self.max_tokens = profile.target_tokens * 2;
        self.overlap_tokens = profile.overlap_tokens;
        self.window_size = profile.window_size;
        self.window_overlap = profile.window_overlap;
        self.active_profile = profile.name.clone();
    }
}

/// Configuration for chunking a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Desired token chunk size
    pub target_tokens: usize,

    /// Hard upper bound for a token chunk
    pub max_tokens: usize,

    /// Minimum token estimate for any chunk of a multi-chunk document
    pub min_tokens: usize,

    /// Tokens shared by successive token chunks
    pub overlap_tokens: usize,

    /// Characters per estimated token
    pub chars_per_token: usize,

    /// Radius of the boundary snap search, in characters
    pub snap_search_chars: usize,

    /// Snap points must fall at or past this fraction of the window
    pub snap_min_ratio: f32,

    /// Lower bound on advancement, as a fraction of the target size
    pub min_advance_ratio: f32,

    /// Sentences per sliding window
    pub window_size: usize,

    /// Sentences shared by successive windows
    pub window_overlap: usize,

    /// Largest sentence count still buffered into the next paragraph
    pub buffer_max_sentences: usize,

    /// Largest sentence count kept as one intact chunk
    pub intact_max_sentences: usize,

    /// Paragraphs shorter than this may be fragments
    pub min_paragraph_chars: usize,

    /// Paragraphs processed between cooperative yields
    pub yield_every_paragraphs: usize,

    /// Token windows processed between cooperative yields
    pub yield_every_windows: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_tokens: DEFAULT_TARGET_TOKENS,
            max_tokens: DEFAULT_TARGET_TOKENS * 2,
            min_tokens: DEFAULT_MIN_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            snap_search_chars: 200,
            snap_min_ratio: 0.8,
            min_advance_ratio: 0.25,
            window_size: DEFAULT_WINDOW_SIZE,
            window_overlap: DEFAULT_WINDOW_OVERLAP,
            buffer_max_sentences: 2,
            intact_max_sentences: 7,
            min_paragraph_chars: 40,
            yield_every_paragraphs: 16,
            yield_every_windows: 8,
        }
    }
}

impl ChunkConfig {
    /// Create a config with the given target size in tokens.
    pub fn with_target(tokens: usize) -> Self {
        Self {
            target_tokens: tokens,
            max_tokens: tokens * 2,
            ..Default::default()
        }
    }

    /// Set the token overlap.
    pub fn with_overlap(mut self, tokens: usize) -> Self {
        self.overlap_tokens = tokens;
        self
    }

    /// Set the minimum chunk size in tokens.
    pub fn with_min_tokens(mut self, tokens: usize) -> Self {
        self.min_tokens = tokens;
        self
    }

    /// Set the sliding window shape.
    pub fn with_window(mut self, size: usize, overlap: usize) -> Self {
        self.window_size = size;
        self.window_overlap = overlap;
        self
    }

    pub fn target_chars(&self) -> usize {
        self.target_tokens * self.chars_per_token
    }

    pub fn max_chars(&self) -> usize {
        self.max_tokens.max(self.target_tokens) * self.chars_per_token
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_tokens * self.chars_per_token
    }

    /// Smallest advancement of the token chunker per iteration (always >= 1).
    pub fn min_advance_chars(&self) -> usize {
        ((self.target_chars() as f32 * self.min_advance_ratio).ceil() as usize).max(1)
    }

    /// Check that chunking with this configuration is possible.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chars_per_token == 0 {
            return Err(ChunkError::InvalidConfig(
                "chars_per_token must be at least 1".to_string(),
            ));
        }
        if self.target_tokens == 0 {
            return Err(ChunkError::InvalidConfig(
                "target_tokens must be at least 1".to_string(),
            ));
        }
        if self.min_tokens > self.max_tokens.max(self.target_tokens) {
            return Err(ChunkError::InvalidConfig(format!(
                "min_tokens {} exceeds max_tokens {}",
                self.min_tokens, self.max_tokens
            )));
        }
        if self.window_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Similarity above which a later chunk is dropped as a near duplicate
    pub dedup_threshold: f32,

    /// Largest accepted top_k
    pub max_top_k: usize,

    /// top_k used when none is requested
    pub default_top_k: usize,

    /// Semantic results fetched before the hybrid merge
    pub hybrid_semantic_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        ChunkingConfig::default().retrieval_config()
    }
}

/// Embedding pipeline parameters.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Texts per batch
    pub batch_size: usize,

    /// Retries per text after the first attempt
    pub max_retries: u32,

    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        ChunkingConfig::default().embedding_config()
    }
}

impl EmbeddingConfig {
    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set retry count and delay.
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

/// A named chunking profile with preset sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingProfile {
    /// Profile name
    pub name: String,

    /// Profile description
    pub description: String,

    /// Token chunk target
    pub target_tokens: usize,

    /// Token chunk overlap
    pub overlap_tokens: usize,

    /// Sentences per window
    pub window_size: usize,

    /// Sentences shared by windows
    pub window_overlap: usize,
}

impl ChunkingProfile {
    /// Create default profiles.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "default".to_string(),
                description: "Balanced profile for opinions and filings".to_string(),
                target_tokens: 512,
                overlap_tokens: 50,
                window_size: 8,
                window_overlap: 2,
            },
            Self {
                name: "small".to_string(),
                description: "Smaller chunks for fine-grained retrieval".to_string(),
                target_tokens: 256,
                overlap_tokens: 25,
                window_size: 5,
                window_overlap: 1,
            },
            Self {
                name: "large".to_string(),
                description: "Larger chunks for more context per hit".to_string(),
                target_tokens: 1024,
                overlap_tokens: 100,
                window_size: 12,
                window_overlap: 3,
            },
        ]
    }

    /// Find a default profile by name.
    pub fn find(name: &str) -> Option<Self> {
        Self::defaults().into_iter().find(|p| p.name == name)
    }
}

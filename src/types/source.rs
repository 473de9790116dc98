//! Source documents and request/response definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chunking strategy applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Paragraph-aware sentence chunking with sliding windows
    Sentence,
    /// Fixed-size character windows, for text without reliable paragraphs
    Token,
}

impl std::fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkingStrategy::Sentence => write!(f, "sentence"),
            ChunkingStrategy::Token => write!(f, "token"),
        }
    }
}

/// A document whose text has already been extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Unique identifier for this document
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Name of the uploaded file
    pub filename: String,

    /// Content MIME type (e.g., "application/pdf", "text/plain")
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Extracted text
    #[serde(default)]
    pub text: String,

    /// Per-page text for paginated input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<String>>,

    /// Strategy override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ChunkingStrategy>,
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

impl SourceDocument {
    /// Create a plain-text document.
    pub fn new(filename: &str, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            content_type: default_content_type(),
            text: text.to_string(),
            pages: None,
            strategy: None,
        }
    }

    /// Create a paginated document (e.g. extracted from a PDF).
    pub fn paginated(filename: &str, pages: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            text: String::new(),
            pages: Some(pages),
            strategy: None,
        }
    }

    /// Set the strategy override.
    pub fn with_strategy(mut self, strategy: ChunkingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Whether this document came with page boundaries.
    pub fn is_paginated(&self) -> bool {
        self.pages.as_ref().map_or(false, |p| !p.is_empty())
    }

    /// Full text, with pages joined by blank lines when paginated.
    pub fn full_text(&self) -> String {
        match &self.pages {
            Some(pages) if !pages.is_empty() => pages.join(PAGE_SEPARATOR),
            _ => self.text.clone(),
        }
    }

    /// Character offset at which each page starts in [`Self::full_text`].
    pub fn page_offsets(&self) -> Vec<usize> {
        let Some(pages) = &self.pages else {
            return Vec::new();
        };
        let sep = PAGE_SEPARATOR.chars().count();
        let mut offsets = Vec::with_capacity(pages.len());
        let mut offset = 0;
        for page in pages {
            offsets.push(offset);
            offset += page.chars().count() + sep;
        }
        offsets
    }
}

/// Separator inserted between pages of paginated input.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Stage of the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extraction,
    Chunking,
    Embedding,
    Save,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Extraction => write!(f, "extraction"),
            PipelineStage::Chunking => write!(f, "chunking"),
            PipelineStage::Embedding => write!(f, "embedding"),
            PipelineStage::Save => write!(f, "save"),
        }
    }
}

/// Request to ingest documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartIngestRequest {
    /// Documents to chunk, embed and store
    pub documents: Vec<SourceDocument>,
}

/// Response when starting an ingest job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartIngestResponse {
    /// ID of the created job
    pub job_id: Uuid,

    /// Whether the job was accepted
    pub accepted: bool,

    /// Number of documents queued
    pub documents_count: usize,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Status of an ingest job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued but not started
    Pending,
    /// Job is currently running
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed
    Failed,
    /// Job was cancelled before completing
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Response with job status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// ID of the job
    pub job_id: Uuid,

    /// Current status
    pub status: JobStatus,

    /// Total documents to process
    pub total_documents: usize,

    /// Documents processed so far
    pub processed_documents: usize,

    /// Total chunks stored
    pub chunks_created: usize,

    /// Stage that failed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<PipelineStage>,

    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the job started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets() {
        let doc = SourceDocument::paginated("a.pdf", vec!["abc".into(), "de".into(), "f".into()]);
        assert_eq!(doc.full_text(), "abc\n\nde\n\nf");
        assert_eq!(doc.page_offsets(), vec![0, 5, 9]);
        assert!(doc.is_paginated());
    }

    #[test]
    fn test_plain_document_has_no_pages() {
        let doc = SourceDocument::new("a.txt", "Some text.");
        assert!(!doc.is_paginated());
        assert!(doc.page_offsets().is_empty());
        assert_eq!(doc.full_text(), "Some text.");
    }

    #[test]
    fn test_deserialize_minimal_document() {
        let doc: SourceDocument =
            serde_json::from_value(serde_json::json!({ "filename": "x.txt", "text": "Hi." }))
                .unwrap();
        assert_eq!(doc.content_type, "text/plain");
        assert!(doc.strategy.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}

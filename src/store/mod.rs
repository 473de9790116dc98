//! Chunk store keyed by document.
//!
//! Chunks live in memory and, when a data directory is configured, are
//! mirrored to `{data_dir}/{document_id}.json`. A document is always added
//! and removed as a unit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Chunk, ChunkFile, ChunkingStrategy};

/// Listing entry for a stored document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub original_filename: String,
    pub chunking_strategy: ChunkingStrategy,
    pub chunk_count: usize,
    pub embedded_count: usize,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

impl From<&ChunkFile> for DocumentSummary {
    fn from(file: &ChunkFile) -> Self {
        Self {
            document_id: file.document_id,
            original_filename: file.original_filename.clone(),
            chunking_strategy: file.chunking_strategy,
            chunk_count: file.chunk_count,
            embedded_count: file.embedded_count(),
            uploaded_at: file.uploaded_at,
        }
    }
}

pub struct ChunkStore {
    files: RwLock<HashMap<Uuid, ChunkFile>>,
    data_dir: Option<PathBuf>,
}

impl ChunkStore {
    /// A store that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            data_dir: None,
        }
    }

    /// A store persisted under `data_dir`, which is created if missing.
    pub async fn persistent(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(Self {
            files: RwLock::new(HashMap::new()),
            data_dir: Some(data_dir),
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    fn file_path(&self, document_id: Uuid) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", document_id)))
    }

    /// Load every persisted chunk file. Unreadable files are skipped.
    pub async fn load_all(&self) -> Result<usize, StoreError> {
        let Some(dir) = &self.data_dir else {
            return Ok(0);
        };

        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut loaded = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<ChunkFile>(&bytes) {
                Ok(file) => loaded.push(file),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable chunk file"),
            }
        }

        let count = loaded.len();
        let mut files = self.files.write().await;
        for file in loaded {
            files.insert(file.document_id, file);
        }
        info!(count, dir = %dir.display(), "Loaded chunk files");
        Ok(count)
    }

    /// Store (or replace) a document's chunks.
    pub async fn save(&self, file: ChunkFile) -> Result<(), StoreError> {
        if let Some(path) = self.file_path(file.document_id) {
            let json = serde_json::to_vec_pretty(&file)?;
            tokio::fs::write(&path, json).await?;
            debug!(path = %path.display(), "Persisted chunk file");
        }
        self.files.write().await.insert(file.document_id, file);
        Ok(())
    }

    pub async fn get(&self, document_id: Uuid) -> Option<ChunkFile> {
        self.files.read().await.get(&document_id).cloned()
    }

    /// Chunks of one document, or all documents when `None`.
    pub async fn chunks(&self, document_id: Option<Uuid>) -> Result<Vec<Chunk>, StoreError> {
        let files = self.files.read().await;
        match document_id {
            Some(id) => files
                .get(&id)
                .map(|f| f.chunks.clone())
                .ok_or(StoreError::NotFound(id)),
            None => Ok(files.values().flat_map(|f| f.chunks.iter().cloned()).collect()),
        }
    }

    /// Summaries ordered by upload time.
    pub async fn list(&self) -> Vec<DocumentSummary> {
        let files = self.files.read().await;
        let mut summaries: Vec<DocumentSummary> = files.values().map(DocumentSummary::from).collect();
        summaries.sort_by_key(|s| s.uploaded_at);
        summaries
    }

    /// Remove a document and all of its chunks, on disk and then in memory.
    ///
    /// If the file cannot be removed the document stays in memory as well.
    pub async fn delete(&self, document_id: Uuid) -> Result<ChunkFile, StoreError> {
        let mut files = self.files.write().await;
        if !files.contains_key(&document_id) {
            return Err(StoreError::NotFound(document_id));
        }

        if let Some(path) = self.file_path(document_id) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(%document_id, path = %path.display(), error = %e, "Failed to remove chunk file");
                    return Err(e.into());
                }
            }
        }

        let removed = files
            .remove(&document_id)
            .ok_or(StoreError::NotFound(document_id))?;
        info!(%document_id, chunks = removed.chunk_count, "Deleted document");
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

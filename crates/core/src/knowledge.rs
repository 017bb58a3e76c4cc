//! Knowledge-base retrieval collaborators.
//!
//! Each knowledge base is a vector collection named by its identifier. Points
//! carry a chunk of a source file; file names are resolved separately.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::{DirectoryError, StoreError};

/// One chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub page: u32,
    /// Position of the chunk within its source file.
    pub seq_num: u32,
    #[serde(default)]
    pub score: f32,
    pub file_id: String,
}

/// File metadata needed for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
}

/// Nearest-neighbour search over per-knowledge-base collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `top_k` points ordered by descending similarity.
    ///
    /// A missing collection is reported as [`StoreError::CollectionNotFound`];
    /// callers decide whether that is an empty result.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;
}

/// Batch lookup of file metadata.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Unknown identifiers are simply absent from the returned map.
    async fn load_files_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, FileMetadata>, DirectoryError>;
}

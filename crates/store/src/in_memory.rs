//! In-memory vector store — useful for testing and ephemeral demos.

use async_trait::async_trait;
use ragrelay_core::error::StoreError;
use ragrelay_core::knowledge::{RetrievedChunk, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::vector::top_k_by_similarity;

struct StoredPoint {
    vector: Vec<f32>,
    chunk: RetrievedChunk,
}

/// Collections of points held in a HashMap, searched by brute force.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, Vec<StoredPoint>>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection. Searching an unknown collection is an error.
    pub async fn create_collection(&self, name: impl Into<String>) {
        self.collections.write().await.entry(name.into()).or_default();
    }

    /// Add a point, creating its collection on first use.
    pub async fn insert(&self, collection: impl Into<String>, vector: Vec<f32>, chunk: RetrievedChunk) {
        self.collections
            .write()
            .await
            .entry(collection.into())
            .or_default()
            .push(StoredPoint { vector, chunk });
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let collections = self.collections.read().await;
        let points = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let ranked = top_k_by_similarity(
            points.iter().map(|p| (p.vector.as_slice(), &p.chunk)),
            vector,
            top_k,
        );

        Ok(ranked
            .into_iter()
            .map(|(score, chunk)| RetrievedChunk {
                score,
                ..chunk.clone()
            })
            .collect())
    }
}

//! Qdrant vector search over its REST API.
//!
//! Each knowledge base is one collection named by the knowledge-base id.
//! Point payloads carry `content`, `page`, `seq_num`, and `file_id`.

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use ragrelay_core::error::StoreError;
use ragrelay_core::knowledge::{RetrievedChunk, VectorStore};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Collection names stay a single path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl QdrantStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    pub fn from_config(config: &ragrelay_config::VectorStoreConfig) -> Self {
        Self::new(&config.url, config.api_key.clone())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let url = format!(
            "{}/collections/{}/points/query",
            self.base_url,
            utf8_percent_encode(collection, SEGMENT)
        );
        let body = serde_json::json!({
            "query": vector,
            "limit": top_k,
            "with_payload": true,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::QueryFailed(format!("HTTP {}: {text}", status.as_u16())));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;

        let total = parsed.result.points.len();
        let chunks: Vec<RetrievedChunk> = parsed
            .result
            .points
            .into_iter()
            .filter_map(ScoredPoint::into_chunk)
            .collect();

        if chunks.len() < total {
            warn!(collection, dropped = total - chunks.len(), "Points without file_id skipped");
        }
        debug!(collection, hits = chunks.len(), "Qdrant query finished");
        Ok(chunks)
    }
}

// --- Qdrant API types (internal) ---

#[derive(Debug, Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    payload: Option<ChunkPayload>,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    seq_num: u32,
    #[serde(default)]
    file_id: Option<String>,
}

impl ScoredPoint {
    fn into_chunk(self) -> Option<RetrievedChunk> {
        let payload = self.payload?;
        Some(RetrievedChunk {
            content: payload.content,
            page: payload.page,
            seq_num: payload.seq_num,
            score: self.score,
            file_id: payload.file_id?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_parses_points() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/kb-1/points/query"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(serde_json::json!({"limit": 30, "with_payload": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "result": {"points": [
                    {"id": 1, "score": 0.91, "payload": {"content": "Refunds take 5 days.", "page": 3, "seq_num": 7, "file_id": "f-1"}},
                    {"id": 2, "score": 0.80, "payload": {"content": "orphan"}}
                ]}
            })))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri(), Some("secret".into()));
        let chunks = store.search("kb-1", &[0.1, 0.2], 30).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file_id, "f-1");
        assert_eq!(chunks[0].page, 3);
        assert_eq!(chunks[0].seq_num, 7);
    }

    #[tokio::test]
    async fn missing_collection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "status": {"error": "Collection `kb-x` doesn't exist!"}
            })))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri(), None);
        let err = store.search("kb-x", &[0.1], 30).await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn server_error_is_query_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri(), None);
        let err = store.search("kb-1", &[0.1], 30).await.unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn collection_name_is_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/kb%201%2Fdraft/points/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "result": {"points": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri(), None);
        let chunks = store.search("kb 1/draft", &[0.1], 5).await.unwrap();
        assert!(chunks.is_empty());
    }
}
